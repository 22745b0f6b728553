//! Export of the visible item list: CSV for spreadsheets, SQL for import
//! into a relational database.

pub mod csv;
pub mod sql;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ArchiveError, Result};
use crate::model::VisibleItem;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Sql,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Sql => "sql",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "sql" => Ok(Self::Sql),
            other => Err(format!("unknown export format '{other}' (csv, sql)")),
        }
    }
}

/// Who exported, and when. Written into the SQL header.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub generated_at: DateTime<Utc>,
    pub user_email: String,
}

/// `family_archive_export_{YYYY-MM-DD}.{ext}`
pub fn default_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "family_archive_export_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Write `items` in `format` to `writer`.
pub fn write_export<W: Write>(
    items: &[VisibleItem],
    format: ExportFormat,
    context: &ExportContext,
    writer: W,
) -> Result<()> {
    if items.is_empty() {
        return Err(ArchiveError::Export("no items to export".into()));
    }
    let result = match format {
        ExportFormat::Csv => csv::write_csv(items, writer),
        ExportFormat::Sql => sql::write_sql(items, context, writer),
    };
    result.map_err(|e| ArchiveError::Export(e.to_string()))
}

/// Export `items` to a file at `output_path`.
pub fn export_to_file(
    items: &[VisibleItem],
    format: ExportFormat,
    context: &ExportContext,
    output_path: &Path,
) -> Result<()> {
    if items.is_empty() {
        return Err(ArchiveError::Export("no items to export".into()));
    }
    let file = File::create(output_path).map_err(|e| ArchiveError::io(output_path, e))?;
    let mut writer = BufWriter::new(file);
    write_export(items, format, context, &mut writer)?;
    writer
        .flush()
        .map_err(|e| ArchiveError::io(output_path, e))?;
    tracing::info!(
        path = %output_path.display(),
        items = items.len(),
        format = format.extension(),
        "Exported archive"
    );
    Ok(())
}

/// Bytes to megabytes with two decimals, as shown in both formats.
pub(crate) fn megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

//! Export items to CSV.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::{self, Write};

use crate::model::VisibleItem;
use crate::search::strip_html;

use super::megabytes;

const HEADER: &str = "ID,Title,Description,Item Type,Category,Related Date,Location,\
Owner Email,Shared With,Files Count,Total File Size (MB),File Names,Has Transcriptions,\
Has AI Descriptions,Created At,Updated At";

/// Write one header row and one row per item.
///
/// Lists (shared emails, file names) are joined with `"; "`. Descriptions
/// are written as plain text.
pub fn write_csv<W: Write>(items: &[VisibleItem], mut out: W) -> io::Result<()> {
    out.write_all(&[0xEF, 0xBB, 0xBF])?;
    writeln!(out, "{HEADER}")?;

    for item in items {
        let file_names = item
            .files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let row = [
            csv_escape(&item.id),
            csv_escape(&item.title),
            csv_escape(&strip_html(&item.description)),
            csv_escape(item.item_type.label()),
            csv_escape(item.category.label()),
            csv_escape(&item.related_date),
            csv_escape(&item.physical_location),
            csv_escape(&item.owner_email),
            csv_escape(&item.shared_with.join("; ")),
            item.files.len().to_string(),
            megabytes(item.total_file_size()),
            csv_escape(&file_names),
            yes_no(item.has_transcriptions()).to_string(),
            yes_no(item.has_ai_descriptions()).to_string(),
            item.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            item.updated_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ];
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Escape a value for CSV (RFC 4180): quote it when it holds a separator,
/// a quote or a line break, doubling inner quotes.
pub fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

//! Export items as a SQL script: two tables and one INSERT per item and
//! per attachment.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::VisibleItem;

use super::{megabytes, ExportContext};

const SCHEMA: &str = "-- Create archive_items table
CREATE TABLE IF NOT EXISTS archive_items (
    id VARCHAR(255) PRIMARY KEY,
    title VARCHAR(500) NOT NULL,
    description TEXT,
    item_type VARCHAR(100) NOT NULL,
    category VARCHAR(100) NOT NULL,
    date VARCHAR(100),
    location VARCHAR(500),
    owner_email VARCHAR(255) NOT NULL,
    shared_with TEXT,
    files_count INT DEFAULT 0,
    total_file_size_mb DECIMAL(10,2) DEFAULT 0,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

-- Create archive_files table
CREATE TABLE IF NOT EXISTS archive_files (
    id INT AUTO_INCREMENT PRIMARY KEY,
    item_id VARCHAR(255) NOT NULL,
    file_name VARCHAR(500) NOT NULL,
    file_url TEXT NOT NULL,
    file_type VARCHAR(100),
    file_size_bytes BIGINT,
    file_size_mb DECIMAL(10,2),
    storage_path TEXT,
    has_transcription BOOLEAN DEFAULT FALSE,
    transcription LONGTEXT,
    has_ai_description BOOLEAN DEFAULT FALSE,
    ai_description TEXT,
    FOREIGN KEY (item_id) REFERENCES archive_items(id) ON DELETE CASCADE
);
";

/// Write the full script: header comment, schema, inserts, summary.
pub fn write_sql<W: Write>(
    items: &[VisibleItem],
    context: &ExportContext,
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "-- Family Archive Tracker Export")?;
    writeln!(
        out,
        "-- Generated: {}",
        context
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    )?;
    writeln!(out, "-- User: {}", context.user_email)?;
    writeln!(out, "-- Total Items: {}", items.len())?;
    writeln!(out)?;
    writeln!(out, "{SCHEMA}")?;
    writeln!(out, "-- Insert archive items")?;

    let mut file_count = 0usize;
    let mut total_bytes = 0u64;

    for item in items {
        writeln!(
            out,
            "INSERT INTO archive_items (id, title, description, item_type, category, date, \
             location, owner_email, shared_with, files_count, total_file_size_mb, created_at, \
             updated_at) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
            sql_string(&item.id),
            sql_string(&item.title),
            sql_string(&item.description),
            sql_string(item.item_type.label()),
            sql_string(item.category.label()),
            sql_string(&item.related_date),
            sql_string(&item.physical_location),
            sql_string(&item.owner_email),
            sql_string(&item.shared_with.join("; ")),
            item.files.len(),
            megabytes(item.total_file_size()),
            sql_timestamp(item.created_at),
            sql_timestamp(item.updated_at),
        )?;

        for file in &item.files {
            writeln!(
                out,
                "INSERT INTO archive_files (item_id, file_name, file_url, file_type, \
                 file_size_bytes, file_size_mb, storage_path, has_transcription, transcription, \
                 has_ai_description, ai_description) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, \
                 {}, {});",
                sql_string(&item.id),
                sql_string(&file.name),
                sql_string(&file.url),
                sql_string(&file.mime_type),
                file.size,
                megabytes(file.size),
                sql_string(&file.path),
                sql_bool(file.has_transcription),
                sql_string(file.transcription.as_deref().unwrap_or_default()),
                sql_bool(file.has_ai_description),
                sql_string(file.ai_description.as_deref().unwrap_or_default()),
            )?;
        }
        writeln!(out)?;

        file_count += item.files.len();
        total_bytes += item.total_file_size();
    }

    writeln!(out, "-- Export Summary")?;
    writeln!(out, "-- Total archive items: {}", items.len())?;
    writeln!(out, "-- Total files: {file_count}")?;
    writeln!(out, "-- Total storage used: {} MB", megabytes(total_bytes))?;
    Ok(())
}

/// Quote a string literal. Empty strings become `NULL`; single quotes are
/// doubled, then backslashes.
pub fn sql_string(value: &str) -> String {
    if value.is_empty() {
        return "NULL".to_string();
    }
    format!("'{}'", value.replace('\'', "''").replace('\\', "\\\\"))
}

/// `'YYYY-MM-DD HH:MM:SS'` in UTC, or `NULL`.
fn sql_timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(t) => format!("'{}'", t.format("%Y-%m-%d %H:%M:%S")),
        None => "NULL".to_string(),
    }
}

fn sql_bool(flag: bool) -> &'static str {
    if flag {
        "TRUE"
    } else {
        "FALSE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveItem, Category, FileAttachment, ItemType};
    use chrono::TimeZone;

    fn item(files: Vec<FileAttachment>) -> VisibleItem {
        VisibleItem {
            item: ArchiveItem {
                id: "i1".into(),
                owner_id: "u1".into(),
                owner_email: "a@x.com".into(),
                title: "Grandma's quilt".into(),
                item_type: ItemType::Clothing,
                category: Category::FamilyHistory,
                description: String::new(),
                transcription: String::new(),
                related_date: String::new(),
                physical_location: "C:\\closet".into(),
                shared_with: vec![],
                files,
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single(),
                updated_at: None,
            },
            is_owner: true,
        }
    }

    fn photo() -> FileAttachment {
        FileAttachment {
            name: "quilt.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 2 * 1024 * 1024,
            url: "mem://p".into(),
            path: "p".into(),
            uploaded_at: Utc::now(),
            transcription: None,
            has_transcription: false,
            ai_description: Some("A patchwork quilt".into()),
            has_ai_description: true,
        }
    }

    #[test]
    fn test_sql_string_escaping() {
        assert_eq!(sql_string("it's"), "'it''s'");
        assert_eq!(sql_string("a\\b"), "'a\\\\b'");
        assert_eq!(sql_string(""), "NULL");
    }

    #[test]
    fn test_write_sql_script() {
        let ctx = ExportContext {
            generated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            user_email: "a@x.com".into(),
        };
        let mut buf = Vec::new();
        write_sql(&[item(vec![photo()])], &ctx, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();

        assert!(script.starts_with("-- Family Archive Tracker Export\n"));
        assert!(script.contains("-- Generated: 2024-06-01T12:00:00.000Z"));
        assert!(script.contains("-- User: a@x.com"));
        assert!(script.contains("CREATE TABLE IF NOT EXISTS archive_items"));
        assert!(script.contains("'Grandma''s quilt'"));
        assert!(script.contains("'C:\\\\closet'"));
        assert!(script.contains("'2024-01-02 03:04:05', NULL);"));
        assert!(script.contains("'quilt.jpg'"));
        assert!(script.contains("FALSE, NULL, TRUE, 'A patchwork quilt');"));
        assert!(script.contains("-- Total files: 1"));
        assert!(script.contains("-- Total storage used: 2.00 MB"));
    }
}

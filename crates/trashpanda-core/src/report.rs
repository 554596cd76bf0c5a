use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::DeletionLog;
use crate::timestamp::Zone;

/// Default output filenames, overridable by the caller.
pub const REPORT_CSV: &str = "output.csv";
pub const METADATA_CSV: &str = "output_metadata.csv";
pub const TRASH_LOG_CSV: &str = "output_trashdb.csv";
pub const MERGED_CSV: &str = "merged_output.csv";

/// Placeholder written into timestamp columns of unmatched merge rows.
pub const NOT_FOUND: &str = "Not found";

/// Enriched-log report columns, in fixed order.
pub const REPORT_HEADERS: [&str; 8] = [
    "Original Title",
    "Extracted Timestamps",
    "EXIF Created",
    "File Type",
    "Camera Model",
    "Unixepoch Timestamp",
    "Deleted_CST",
    "File Path",
];

/// One metadata table entry (secondary workflow), one per image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataRow {
    #[serde(rename = "DateCreated")]
    pub date_created: String,
    #[serde(rename = "DateModified")]
    pub date_modified: String,
    #[serde(rename = "Camera")]
    pub camera: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Extension")]
    pub extension: String,
    #[serde(rename = "FilePath")]
    pub file_path: String,
}

/// One exported deletion-log entry (secondary workflow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashLogRow {
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "Unixepoch Timestamp")]
    pub epoch: String,
    #[serde(rename = "Deleted_CST")]
    pub deleted_local: String,
}

/// One merged output row: deletion-log fields joined onto a metadata row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "Unixepoch Timestamp")]
    pub epoch: String,
    #[serde(rename = "Deleted_CST")]
    pub deleted_local: String,
    #[serde(rename = "DateCreated")]
    pub date_created: String,
    #[serde(rename = "DateModified")]
    pub date_modified: String,
    #[serde(rename = "Camera")]
    pub camera: String,
    #[serde(rename = "Extension")]
    pub extension: String,
    #[serde(rename = "FilePath")]
    pub file_path: String,
}

/// Flatten the enriched deletion log into the report CSV. NULL columns export
/// as empty cells; the localized deletion time is the epoch divided down to
/// seconds, rendered in `zone`.
pub fn export_enriched_log(store: &DeletionLog, out: &Path, zone: Zone) -> Result<u64> {
    let mut writer = csv::Writer::from_path(out)?;
    writer.write_record(REPORT_HEADERS)?;

    let mut written = 0u64;
    for row in store.report_rows()? {
        let epoch = row
            .date_deleted
            .map(|ms| ms.to_string())
            .unwrap_or_default();
        let deleted_local = row
            .date_deleted
            .and_then(|ms| zone.epoch_to_canonical(ms / 1000))
            .unwrap_or_default();
        writer.write_record([
            row.title.unwrap_or_default(),
            row.converted_title.unwrap_or_default(),
            row.exif_created.unwrap_or_default(),
            row.file_type.unwrap_or_default(),
            row.camera_model.unwrap_or_default(),
            epoch,
            deleted_local,
            row.file_path.unwrap_or_default(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Export a raw deletion log (title, epoch, localized deletion time) to CSV.
/// A missing `trashes` table is fatal here: this entry point targets one
/// specific database file.
pub fn export_deletion_log(db: &Path, out: &Path, zone: Zone) -> Result<u64> {
    let store = DeletionLog::open(db)?;
    let rows = store.deletion_rows()?;

    let mut writer = csv::Writer::from_path(out)?;
    if rows.is_empty() {
        writer.write_record(["title", "Unixepoch Timestamp", "Deleted_CST"])?;
    }
    let mut written = 0u64;
    for row in rows {
        writer.serialize(TrashLogRow {
            title: row.title.unwrap_or_default(),
            epoch: row
                .date_deleted
                .map(|ms| ms.to_string())
                .unwrap_or_default(),
            deleted_local: row
                .date_deleted
                .and_then(|ms| zone.epoch_to_canonical(ms / 1000))
                .unwrap_or_default(),
        })?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

pub fn write_metadata_csv(rows: &[MetadataRow], out: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(out)?;
    if rows.is_empty() {
        // serde only emits headers alongside a first record; an empty table
        // still gets its header row.
        writer.write_record([
            "DateCreated",
            "DateModified",
            "Camera",
            "Title",
            "Extension",
            "FilePath",
        ])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_metadata_csv(path: &Path) -> Result<Vec<MetadataRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn read_trash_log_csv(path: &Path) -> Result<Vec<TrashLogRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Join each metadata row against the deletion log: linear scan in original
/// order, first log row whose non-empty title is a substring of the metadata
/// row's file path wins. Unmatched rows keep an empty title and get the
/// `"Not found"` placeholder in both timestamp columns.
pub fn merge_rows(metadata: &[MetadataRow], trash: &[TrashLogRow]) -> Vec<MergedRow> {
    metadata
        .iter()
        .map(|m| {
            let matched = trash
                .iter()
                .find(|t| !t.title.is_empty() && m.file_path.contains(&t.title));
            match matched {
                Some(t) => MergedRow {
                    title: t.title.clone(),
                    epoch: t.epoch.clone(),
                    deleted_local: t.deleted_local.clone(),
                    date_created: m.date_created.clone(),
                    date_modified: m.date_modified.clone(),
                    camera: m.camera.clone(),
                    extension: m.extension.clone(),
                    file_path: m.file_path.clone(),
                },
                None => MergedRow {
                    title: String::new(),
                    epoch: NOT_FOUND.to_string(),
                    deleted_local: NOT_FOUND.to_string(),
                    date_created: m.date_created.clone(),
                    date_modified: m.date_modified.clone(),
                    camera: m.camera.clone(),
                    extension: m.extension.clone(),
                    file_path: m.file_path.clone(),
                },
            }
        })
        .collect()
}

/// Read both intermediate CSVs, merge, and write the combined table.
pub fn merge_reports(metadata_csv: &Path, trash_csv: &Path, out: &Path) -> Result<u64> {
    let metadata = read_metadata_csv(metadata_csv)?;
    let trash = read_trash_log_csv(trash_csv)?;
    let merged = merge_rows(&metadata, &trash);

    let mut writer = csv::Writer::from_path(out)?;
    if merged.is_empty() {
        writer.write_record([
            "title",
            "Unixepoch Timestamp",
            "Deleted_CST",
            "DateCreated",
            "DateModified",
            "Camera",
            "Extension",
            "FilePath",
        ])?;
    }
    for row in &merged {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(merged.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rusqlite::{params, Connection};

    fn utc() -> Zone {
        Zone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn meta_row(file_path: &str) -> MetadataRow {
        MetadataRow {
            date_created: "2023:06:01 10:15:30".into(),
            camera: "Pixel 7".into(),
            extension: "jpg".into(),
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_export_enriched_log_writes_fixed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("trash.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("CREATE TABLE trashes (title TEXT, date_deleted INTEGER);")
                .unwrap();
            conn.execute(
                "INSERT INTO trashes (title, date_deleted) VALUES (?1, ?2)",
                params!["IMG_20230601_101530", 1_685_601_330_000_i64],
            )
            .unwrap();
        }
        let store = DeletionLog::open(&db).unwrap();
        store.ensure_derived_columns().unwrap();

        let out = dir.path().join("output.csv");
        assert_eq!(export_enriched_log(&store, &out, utc()).unwrap(), 1);

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), REPORT_HEADERS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("IMG_20230601_101530,"));
        assert!(row.contains("1685601330000"));
        assert!(row.contains("2023/06/01 06:35:30"));
    }

    #[test]
    fn test_export_deletion_log_requires_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("wrong.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE other (x);")
            .unwrap();
        let out = dir.path().join("log.csv");
        assert!(matches!(
            export_deletion_log(&db, &out, utc()),
            Err(crate::error::Error::Schema { .. })
        ));
    }

    #[test]
    fn test_merge_first_match_wins() {
        let metadata = vec![meta_row("/scratch/zip > /tmp/IMG_001.jpg")];
        let trash = vec![
            TrashLogRow {
                title: "IMG_001".into(),
                epoch: "1685601330000".into(),
                deleted_local: "2023/06/01 06:35:30".into(),
            },
            TrashLogRow {
                title: "IMG_001.jpg".into(),
                epoch: "9999999999999".into(),
                deleted_local: "should not win".into(),
            },
        ];
        let merged = merge_rows(&metadata, &trash);
        assert_eq!(merged[0].title, "IMG_001");
        assert_eq!(merged[0].epoch, "1685601330000");
        assert_eq!(merged[0].camera, "Pixel 7");
    }

    #[test]
    fn test_merge_unmatched_rows_get_placeholder() {
        let metadata = vec![meta_row("/photos/holiday.jpg")];
        let trash = vec![TrashLogRow {
            title: "IMG_001".into(),
            epoch: "1685601330000".into(),
            deleted_local: "2023/06/01 06:35:30".into(),
        }];
        let merged = merge_rows(&metadata, &trash);
        assert_eq!(merged[0].title, "");
        assert_eq!(merged[0].epoch, NOT_FOUND);
        assert_eq!(merged[0].deleted_local, NOT_FOUND);
        // Metadata fields pass through untouched.
        assert_eq!(merged[0].date_created, "2023:06:01 10:15:30");
    }

    #[test]
    fn test_merge_csv_round_trip_headers() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join(METADATA_CSV);
        let trash_path = dir.path().join(TRASH_LOG_CSV);
        let merged_path = dir.path().join(MERGED_CSV);

        write_metadata_csv(&[meta_row("/tmp/IMG_001.jpg")], &meta_path).unwrap();
        {
            let mut writer = csv::Writer::from_path(&trash_path).unwrap();
            writer
                .serialize(TrashLogRow {
                    title: "IMG_001".into(),
                    epoch: "1685601330000".into(),
                    deleted_local: "2023/06/01 06:35:30".into(),
                })
                .unwrap();
            writer.flush().unwrap();
        }

        assert_eq!(
            merge_reports(&meta_path, &trash_path, &merged_path).unwrap(),
            1
        );
        let text = std::fs::read_to_string(&merged_path).unwrap();
        assert!(text.starts_with(
            "title,Unixepoch Timestamp,Deleted_CST,DateCreated,DateModified,Camera,Extension,FilePath"
        ));
        assert!(text.contains("IMG_001,1685601330000"));
    }
}

use std::collections::HashMap;

use crate::error::Result;
use crate::metadata::{MetadataReader, ReadOutcome};
use crate::store::{DeletionLog, Enrichment};
use crate::timestamp::{self, Zone};
use crate::zip_scan::ImageCandidate;
use crate::{LogSink, ThrottledProgress};

/// Outcome counters for one correlation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationStats {
    pub rows_written: u64,
    pub images_matched: u64,
}

/// Key the candidates by filename stem. On duplicate stems the most recently
/// enumerated image wins; discovery order is the tie-break contract.
pub fn build_stem_lookup(candidates: &[ImageCandidate]) -> HashMap<&str, &ImageCandidate> {
    let mut lookup = HashMap::with_capacity(candidates.len());
    for candidate in candidates {
        lookup.insert(candidate.stem.as_str(), candidate);
    }
    lookup
}

/// Enrich every deletion-log row: parse timestamps out of the title, resolve
/// an image by stem match, read its embedded metadata, write all five derived
/// columns back. Every row is written, with nulls where nothing was
/// recoverable; a stem match always populates file type and path even when
/// the image carries no usable metadata. Per-row write failures are logged
/// and absorbed; the pass still commits.
pub fn enrich_log(
    store: &mut DeletionLog,
    candidates: &[ImageCandidate],
    reader: &dyn MetadataReader,
    zone: Zone,
    log: &LogSink<'_>,
    progress: &ThrottledProgress,
) -> Result<CorrelationStats> {
    store.ensure_derived_columns()?;
    let rows = store.rows()?;
    let lookup = build_stem_lookup(candidates);
    let total = rows.len() as u64;

    let mut stats = CorrelationStats::default();
    let pass = store.update_pass()?;
    for (i, row) in rows.iter().enumerate() {
        let mut enrichment = Enrichment {
            converted_title: timestamp::convert_timestamps(&row.title, zone),
            ..Default::default()
        };

        if let Some(candidate) = lookup.get(row.title.as_str()) {
            let (exif_created, camera_model) = match reader.read(&candidate.path) {
                ReadOutcome::Unreadable(reason) => {
                    log(&format!(
                        "metadata unreadable for {}: {}",
                        candidate.path.display(),
                        reason
                    ));
                    (None, None)
                }
                outcome => outcome.into_fields(),
            };
            enrichment.exif_created = exif_created;
            enrichment.camera_model = camera_model;
            enrichment.file_type = candidate
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            enrichment.file_path = Some(candidate.path.display().to_string());
            stats.images_matched += 1;
        }

        match pass.write(row.rowid, &enrichment) {
            Ok(()) => stats.rows_written += 1,
            Err(e) => log(&format!("row {} not updated: {}", row.rowid, e)),
        }
        progress.report("enrich", i as u64, total, &row.title);
    }
    pass.commit()?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ImageMetadata;
    use rusqlite::{params, Connection};
    use std::path::{Path, PathBuf};

    struct FixedReader(ReadOutcome);

    impl MetadataReader for FixedReader {
        fn read(&self, _path: &Path) -> ReadOutcome {
            self.0.clone()
        }
    }

    fn utc() -> Zone {
        Zone::Fixed(chrono::FixedOffset::east_opt(0).unwrap())
    }

    fn fixture_store(dir: &Path, titles: &[&str]) -> DeletionLog {
        let path = dir.join("trash.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE trashes (title TEXT, date_deleted INTEGER);")
            .unwrap();
        for title in titles {
            conn.execute(
                "INSERT INTO trashes (title, date_deleted) VALUES (?1, ?2)",
                params![title, 1_685_601_330_000_i64],
            )
            .unwrap();
        }
        drop(conn);
        DeletionLog::open(&path).unwrap()
    }

    fn candidate(dir: &Path, name: &str) -> ImageCandidate {
        ImageCandidate::from_path(dir.join(name), None)
    }

    #[test]
    fn test_unmatched_row_keeps_image_fields_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fixture_store(dir.path(), &["IMG_20230601_101530"]);

        let progress: &crate::ProgressCallback = &|_, _, _, _| {};
        let stats = enrich_log(
            &mut store,
            &[],
            &FixedReader(ReadOutcome::NoMetadata),
            utc(),
            &|_: &str| {},
            &ThrottledProgress::new(progress),
        )
        .unwrap();
        assert_eq!(stats.rows_written, 1);
        assert_eq!(stats.images_matched, 0);

        let rows = store.report_rows().unwrap();
        assert_eq!(
            rows[0].converted_title.as_deref(),
            Some("2023/06/01 10:15:30")
        );
        assert_eq!(rows[0].exif_created, None);
        assert_eq!(rows[0].file_type, None);
        assert_eq!(rows[0].file_path, None);
        assert_eq!(rows[0].camera_model, None);
    }

    #[test]
    fn test_match_without_metadata_still_records_file_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fixture_store(dir.path(), &["IMG_20230601_101530"]);
        let candidates = vec![candidate(dir.path(), "IMG_20230601_101530.JPG")];

        let progress: &crate::ProgressCallback = &|_, _, _, _| {};
        let stats = enrich_log(
            &mut store,
            &candidates,
            &FixedReader(ReadOutcome::NoMetadata),
            utc(),
            &|_: &str| {},
            &ThrottledProgress::new(progress),
        )
        .unwrap();
        assert_eq!(stats.images_matched, 1);

        let rows = store.report_rows().unwrap();
        assert_eq!(rows[0].file_type.as_deref(), Some("jpg"));
        assert!(rows[0].file_path.as_deref().unwrap().ends_with(".JPG"));
        assert_eq!(rows[0].exif_created, None);
        assert_eq!(rows[0].camera_model, None);
    }

    #[test]
    fn test_matched_metadata_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = fixture_store(dir.path(), &["vacation"]);
        let candidates = vec![candidate(dir.path(), "vacation.png")];
        let outcome = ReadOutcome::Metadata(ImageMetadata {
            capture_time: Some("2023/06/01 10:15:30".into()),
            camera_model: Some("Pixel 7".into()),
        });

        let progress: &crate::ProgressCallback = &|_, _, _, _| {};
        enrich_log(
            &mut store,
            &candidates,
            &FixedReader(outcome),
            utc(),
            &|_: &str| {},
            &ThrottledProgress::new(progress),
        )
        .unwrap();

        let rows = store.report_rows().unwrap();
        // Title has no parseable timestamp; metadata still lands.
        assert_eq!(rows[0].converted_title, None);
        assert_eq!(rows[0].exif_created.as_deref(), Some("2023/06/01 10:15:30"));
        assert_eq!(rows[0].camera_model.as_deref(), Some("Pixel 7"));
        assert_eq!(rows[0].file_type.as_deref(), Some("png"));
    }

    #[test]
    fn test_duplicate_stems_resolve_to_last_enumerated() {
        let a = ImageCandidate::from_path(PathBuf::from("/first/shot.jpg"), None);
        let b = ImageCandidate::from_path(PathBuf::from("/second/shot.jpg"), None);
        let candidates = vec![a, b];

        let lookup = build_stem_lookup(&candidates);
        assert_eq!(
            lookup.get("shot").unwrap().path,
            PathBuf::from("/second/shot.jpg")
        );
    }
}

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Transaction};

use crate::error::{Error, Result};

/// Expected deletion-log table; matched case-insensitively.
pub const TRASH_TABLE: &str = "trashes";

/// Derived columns added by `ensure_derived_columns`, all nullable TEXT.
pub const DERIVED_COLUMNS: &[&str] = &[
    "converted_title",
    "exif_created",
    "file_type",
    "file_path",
    "camera_model",
];

/// One deletion-log entry as read for correlation.
#[derive(Debug, Clone)]
pub struct LogRow {
    pub rowid: i64,
    pub title: String,
}

/// One raw deletion-log entry as exported by the secondary workflow.
#[derive(Debug, Clone)]
pub struct DeletionRow {
    pub title: Option<String>,
    pub date_deleted: Option<i64>,
}

/// The five derived values written back per row. All may be null; a row with
/// no image match carries only `converted_title` (possibly null too).
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub converted_title: Option<String>,
    pub exif_created: Option<String>,
    pub file_type: Option<String>,
    pub file_path: Option<String>,
    pub camera_model: Option<String>,
}

/// One fully-read row of the enriched log, in report column order.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub title: Option<String>,
    pub converted_title: Option<String>,
    pub exif_created: Option<String>,
    pub file_type: Option<String>,
    pub camera_model: Option<String>,
    pub date_deleted: Option<i64>,
    pub file_path: Option<String>,
}

/// Handle on one deletion-log database file.
pub struct DeletionLog {
    conn: Connection,
    path: PathBuf,
}

impl DeletionLog {
    /// Open a database and verify the deletion-log table is present.
    /// The `Schema` error carries the tables that were found instead.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let tables = list_tables(&conn)?;
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(TRASH_TABLE)) {
            return Err(Error::Schema {
                path: path.to_path_buf(),
                table: TRASH_TABLE,
                tables,
            });
        }
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add any derived column not already present. Idempotent; the existing
    /// column check is case-insensitive like SQLite's own name handling.
    pub fn ensure_derived_columns(&self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", TRASH_TABLE))?;
        let existing: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        for column in DERIVED_COLUMNS {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                self.conn.execute(
                    &format!("ALTER TABLE {} ADD COLUMN {} TEXT", TRASH_TABLE, column),
                    [],
                )?;
            }
        }
        Ok(())
    }

    /// All rows for one correlation pass, by stable row identifier.
    pub fn rows(&self) -> Result<Vec<LogRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT rowid, title FROM {}", TRASH_TABLE))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LogRow {
                    rowid: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Raw title/epoch pairs, readable before any enrichment has run.
    pub fn deletion_rows(&self) -> Result<Vec<DeletionRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT title, date_deleted FROM {}", TRASH_TABLE))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeletionRow {
                    title: row.get(0)?,
                    date_deleted: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Enriched rows in fixed report order.
    pub fn report_rows(&self) -> Result<Vec<ReportRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT title, converted_title, exif_created, file_type, camera_model, \
             date_deleted, file_path FROM {}",
            TRASH_TABLE
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ReportRow {
                    title: row.get(0)?,
                    converted_title: row.get(1)?,
                    exif_created: row.get(2)?,
                    file_type: row.get(3)?,
                    camera_model: row.get(4)?,
                    date_deleted: row.get(5)?,
                    file_path: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Begin a write pass. All row updates accumulate in one transaction and
    /// become durable at `commit`, not per row.
    pub fn update_pass(&mut self) -> Result<EnrichmentPass<'_>> {
        let tx = self.conn.transaction()?;
        Ok(EnrichmentPass { tx })
    }
}

/// Transaction-scoped writer over one correlation pass.
pub struct EnrichmentPass<'a> {
    tx: Transaction<'a>,
}

impl EnrichmentPass<'_> {
    /// Update exactly one row's derived columns.
    pub fn write(&self, rowid: i64, enrichment: &Enrichment) -> Result<()> {
        self.tx.execute(
            &format!(
                "UPDATE {} SET converted_title = ?1, exif_created = ?2, file_type = ?3, \
                 file_path = ?4, camera_model = ?5 WHERE rowid = ?6",
                TRASH_TABLE
            ),
            params![
                enrichment.converted_title,
                enrichment.exif_created,
                enrichment.file_type,
                enrichment.file_path,
                enrichment.camera_model,
                rowid
            ],
        )?;
        Ok(())
    }

    /// Single durability point for the pass.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_db(path: &Path, table: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE {} (title TEXT, date_deleted INTEGER);",
            table
        ))
        .unwrap();
    }

    #[test]
    fn test_open_rejects_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        fixture_db(&path, "notes");

        match DeletionLog::open(&path) {
            Err(Error::Schema { table, tables, .. }) => {
                assert_eq!(table, TRASH_TABLE);
                assert_eq!(tables, vec!["notes".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_matches_table_name_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upper.db");
        fixture_db(&path, "TRASHES");
        assert!(DeletionLog::open(&path).is_ok());
    }

    #[test]
    fn test_ensure_derived_columns_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trash.db");
        fixture_db(&path, TRASH_TABLE);

        let log = DeletionLog::open(&path).unwrap();
        log.ensure_derived_columns().unwrap();
        log.ensure_derived_columns().unwrap();

        let mut stmt = log
            .conn
            .prepare("PRAGMA table_info(trashes)")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        for derived in DERIVED_COLUMNS {
            assert_eq!(
                columns.iter().filter(|c| c == derived).count(),
                1,
                "exactly one {} column expected",
                derived
            );
        }
    }

    #[test]
    fn test_write_pass_commits_enrichment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trash.db");
        fixture_db(&path, TRASH_TABLE);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "INSERT INTO trashes (title, date_deleted) VALUES (?1, ?2)",
                params!["IMG_20230601_101530", 1_685_601_330_000_i64],
            )
            .unwrap();
        }

        let mut log = DeletionLog::open(&path).unwrap();
        log.ensure_derived_columns().unwrap();
        let rows = log.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "IMG_20230601_101530");

        let pass = log.update_pass().unwrap();
        pass.write(
            rows[0].rowid,
            &Enrichment {
                converted_title: Some("2023/06/01 10:15:30".into()),
                exif_created: None,
                file_type: Some("jpg".into()),
                file_path: Some("/scratch/IMG_20230601_101530.jpg".into()),
                camera_model: Some("Pixel 7".into()),
            },
        )
        .unwrap();
        pass.commit().unwrap();

        let report = log.report_rows().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(
            report[0].converted_title.as_deref(),
            Some("2023/06/01 10:15:30")
        );
        assert_eq!(report[0].exif_created, None);
        assert_eq!(report[0].file_type.as_deref(), Some("jpg"));
        assert_eq!(report[0].camera_model.as_deref(), Some("Pixel 7"));
        assert_eq!(report[0].date_deleted, Some(1_685_601_330_000));
    }
}

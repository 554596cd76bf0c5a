use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that can surface from a pass. Per-image metadata decode problems
/// are values (`metadata::ReadOutcome`), not errors, and never appear here.
#[derive(Debug, Error)]
pub enum Error {
    /// The expected deletion-log table is missing from a database file.
    #[error("no '{table}' table in {path} (tables present: {tables:?})")]
    Schema {
        path: PathBuf,
        table: &'static str,
        tables: Vec<String>,
    },

    /// An archive could not be opened or read.
    #[error("unreadable archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The external metadata tool failed to launch or returned unusable output.
    #[error("exiftool invocation failed: {0}")]
    ExternalTool(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub mod exif;
pub mod exiftool;

use std::path::Path;

/// Fields recovered from an image's embedded metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Original capture time, canonical `YYYY/MM/DD HH:MM:SS`.
    pub capture_time: Option<String>,
    /// Trimmed camera model string.
    pub camera_model: Option<String>,
}

/// Tagged read result, so callers can tell "no metadata present" apart from
/// "decode error". Neither variant ever aborts a pass; `Unreadable` carries a
/// reason for the logging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Metadata(ImageMetadata),
    NoMetadata,
    Unreadable(String),
}

impl ReadOutcome {
    /// Flatten to the field pair the correlation engine writes; both
    /// degenerate variants yield empty fields.
    pub fn into_fields(self) -> (Option<String>, Option<String>) {
        match self {
            ReadOutcome::Metadata(meta) => (meta.capture_time, meta.camera_model),
            ReadOutcome::NoMetadata | ReadOutcome::Unreadable(_) => (None, None),
        }
    }
}

/// One contract, two interchangeable strategies: in-process EXIF decoding
/// (`exif::ExifReader`) and external-tool invocation
/// (`exiftool::ExiftoolClient`).
pub trait MetadataReader {
    fn read(&self, path: &Path) -> ReadOutcome;
}

/// Parse the EXIF capture-time format into the canonical form. Display
/// layers render the separators inconsistently (`:`, `-`, `/`), so they are
/// normalized to `:` before parsing.
pub(crate) fn canonicalize_exif_datetime(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .replace(['-', '/', '\\', '.'], ":");
    chrono::NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| crate::timestamp::canonical(&dt))
}

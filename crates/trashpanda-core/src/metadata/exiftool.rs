use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

use super::{ImageMetadata, MetadataReader, ReadOutcome};

/// Fields requested from the external tool, one `-TAG` argument each.
pub const EXIFTOOL_FIELDS: &[&str] = &[
    "-DateTimeOriginal",
    "-ModifyDate",
    "-Model",
    "-Title",
    "-FileTypeExtension",
];

/// External-tool strategy: one stateless `exiftool -json` invocation per
/// image. The executable location is supplied by the caller.
#[derive(Debug, Clone)]
pub struct ExiftoolClient {
    exe: PathBuf,
}

impl ExiftoolClient {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Run the tool against one image and return its field map. Keys absent
    /// from the output are simply absent from the map. Launch failures and
    /// unparseable output are `Error::ExternalTool`.
    pub fn extract(&self, image: &Path) -> Result<HashMap<String, String>> {
        let output = Command::new(&self.exe)
            .arg("-json")
            .args(EXIFTOOL_FIELDS)
            .arg(image)
            .output()
            .map_err(|e| Error::ExternalTool(format!("{}: {e}", self.exe.display())))?;
        // exiftool exits non-zero for per-file problems but still emits JSON;
        // the output is authoritative either way.
        parse_exiftool_json(&output.stdout)
    }
}

impl MetadataReader for ExiftoolClient {
    fn read(&self, path: &Path) -> ReadOutcome {
        let fields = match self.extract(path) {
            Ok(fields) => fields,
            Err(e) => return ReadOutcome::Unreadable(e.to_string()),
        };
        let capture_time = fields
            .get("DateTimeOriginal")
            .and_then(|raw| super::canonicalize_exif_datetime(raw));
        let camera_model = fields
            .get("Model")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if capture_time.is_none() && camera_model.is_none() {
            return ReadOutcome::NoMetadata;
        }
        ReadOutcome::Metadata(ImageMetadata {
            capture_time,
            camera_model,
        })
    }
}

/// exiftool -json prints a one-element array per input file.
fn parse_exiftool_json(bytes: &[u8]) -> Result<HashMap<String, String>> {
    let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(bytes)
            .map_err(|e| Error::ExternalTool(format!("unparseable output: {e}")))?;
    let first = parsed
        .into_iter()
        .next()
        .ok_or_else(|| Error::ExternalTool("empty output".to_string()))?;
    Ok(first
        .into_iter()
        .map(|(key, value)| (key, stringify(value)))
        .collect())
}

fn stringify(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

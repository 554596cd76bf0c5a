use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag};

use super::{ImageMetadata, MetadataReader, ReadOutcome};

/// In-process strategy: decode the image's EXIF block directly.
/// EXIF datetimes carry no zone information; they are local time as-is.
#[derive(Debug, Default)]
pub struct ExifReader;

impl ExifReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> ReadOutcome {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => return ReadOutcome::Unreadable(e.to_string()),
        };

        let mut reader = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            // kamadak-exif reports "no metadata" and "broken container" the
            // same way; either means nothing recoverable from this file.
            Err(_) => return ReadOutcome::NoMetadata,
        };

        let capture_time = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .and_then(|f| super::canonicalize_exif_datetime(&f.display_value().to_string()));
        let camera_model = exif.get_field(Tag::Model, In::PRIMARY).and_then(|f| {
            let model = f
                .display_value()
                .to_string()
                .trim()
                .trim_matches('"')
                .trim()
                .to_string();
            if model.is_empty() {
                None
            } else {
                Some(model)
            }
        });

        if capture_time.is_none() && camera_model.is_none() {
            return ReadOutcome::NoMetadata;
        }
        ReadOutcome::Metadata(ImageMetadata {
            capture_time,
            camera_model,
        })
    }
}

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::zip_scan::{self, has_extension, ImageCandidate};
use crate::LogSink;

/// Image extensions recognized when sweeping a directory tree.
pub const TREE_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "heic"];

/// Archive members whose lowercased path contains any of these markers are
/// pulled out for metadata extraction.
pub const TRASH_MARKERS: &[&str] = &[".trashes", "__macosx", "trash"];

/// Recursively collect image files under `root`, in traversal order.
pub fn find_loose_images(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), TREE_IMAGE_EXTENSIONS))
        .map(|e| e.into_path())
        .collect()
}

fn is_trash_member(name: &str) -> bool {
    let lowered = name.to_lowercase();
    TRASH_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Extract every trash-marked member of one archive under `dest_dir`, then
/// collect the images that landed there. Any failure (unreadable archive,
/// unextractable member) is logged and degrades to fewer (or zero)
/// candidates; this never aborts the batch.
pub fn extract_trash_members(
    zip_path: &Path,
    dest_dir: &Path,
    log: &LogSink<'_>,
) -> Vec<ImageCandidate> {
    let archive = File::open(zip_path)
        .map_err(|e| e.to_string())
        .and_then(|f| ZipArchive::new(f).map_err(|e| e.to_string()));
    let mut archive = match archive {
        Ok(a) => a,
        Err(e) => {
            log(&format!(
                "failed to extract from {}: {}",
                zip_path.display(),
                e
            ));
            return Vec::new();
        }
    };

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.is_dir() {
            continue;
        }
        let name = zip_scan::decode_entry_name(entry.name_raw());
        if !is_trash_member(&name) {
            continue;
        }
        let Some(rel) = entry.enclosed_name() else {
            log(&format!("skipping unsafe member path: {}", name));
            continue;
        };
        let target = dest_dir.join(rel);
        if let Some(parent) = target.parent() {
            if fs::create_dir_all(parent).is_err() {
                continue;
            }
        }
        let written = File::create(&target).and_then(|mut out| io::copy(&mut entry, &mut out));
        if let Err(e) = written {
            log(&format!("could not extract {}: {}", name, e));
        }
    }

    let origin = zip_path.display().to_string();
    find_loose_images(dest_dir)
        .into_iter()
        .map(|path| ImageCandidate::from_path(path, Some(origin.clone())))
        .collect()
}

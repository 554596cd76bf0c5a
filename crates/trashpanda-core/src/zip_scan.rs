use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use encoding_rs::SHIFT_JIS;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::LogSink;

/// Database members are recognized by this exact filename suffix.
pub const TRASH_DB_SUFFIX: &str = "trash.db";
/// Vendor path marker identifying the gallery trash-bin storage tree.
pub const GALLERY_MARKER: &str = "com.sec.android.gallery3d";

const PRIMARY_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Classified member lists for one archive, in discovery order. Order
/// matters: the first database candidate that verifies wins.
#[derive(Debug, Default)]
pub struct ArchivePairing {
    pub db_members: Vec<String>,
    pub image_members: Vec<String>,
}

/// A discovered image file, keyed for correlation by its filename stem.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    /// Filename without extension; the join key against deletion-log titles.
    pub stem: String,
    pub path: PathBuf,
    /// Archive the file came from, for provenance display only.
    pub origin_archive: Option<String>,
}

impl ImageCandidate {
    pub fn from_path(path: PathBuf, origin_archive: Option<String>) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            stem,
            path,
            origin_archive,
        }
    }
}

/// Decode a ZIP entry name, trying UTF-8 first, then Shift_JIS.
pub(crate) fn decode_entry_name(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }
    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }
    String::from_utf8_lossy(raw).into_owned()
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

/// Enumerate ZIP archives under `root`, in directory-traversal order.
/// Traversal is name-sorted so "first usable archive wins" is deterministic.
pub fn find_archives(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), &["zip"]))
        .map(|e| e.into_path())
        .collect()
}

fn is_primary_image(member: &str) -> bool {
    member.contains(GALLERY_MARKER)
        && has_extension(Path::new(member), PRIMARY_IMAGE_EXTENSIONS)
}

fn open_archive(zip_path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(zip_path)?;
    ZipArchive::new(file).map_err(|source| Error::Archive {
        path: zip_path.to_path_buf(),
        source,
    })
}

/// List one archive's members and classify them into database and image
/// candidates. A corrupt archive is an `Error::Archive`; callers log it and
/// continue with the next archive.
pub fn read_pairing(zip_path: &Path) -> Result<ArchivePairing> {
    let mut archive = open_archive(zip_path)?;
    let mut pairing = ArchivePairing::default();
    for i in 0..archive.len() {
        let Ok(entry) = archive.by_index_raw(i) else {
            continue;
        };
        if entry.is_dir() {
            continue;
        }
        let name = decode_entry_name(entry.name_raw());
        if name.ends_with(TRASH_DB_SUFFIX) {
            pairing.db_members.push(name);
        } else if is_primary_image(&name) {
            pairing.image_members.push(name);
        }
    }
    Ok(pairing)
}

fn member_index<R: Read + Seek>(archive: &mut ZipArchive<R>, member: &str) -> Option<usize> {
    for i in 0..archive.len() {
        let Ok(entry) = archive.by_index_raw(i) else {
            continue;
        };
        if decode_entry_name(entry.name_raw()) == member {
            return Some(i);
        }
    }
    None
}

/// Extract one database member to `dest_dir`. The extracted file is named
/// `<archive stem>_<member filename>` so candidates from different archives
/// cannot collide.
pub fn extract_database(zip_path: &Path, member: &str, dest_dir: &Path) -> Result<PathBuf> {
    let mut archive = open_archive(zip_path)?;
    let index = member_index(&mut archive, member).ok_or_else(|| Error::Archive {
        path: zip_path.to_path_buf(),
        source: zip::result::ZipError::FileNotFound,
    })?;
    let mut entry = archive.by_index(index).map_err(|source| Error::Archive {
        path: zip_path.to_path_buf(),
        source,
    })?;

    let member_name = Path::new(member)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(TRASH_DB_SUFFIX);
    let zip_stem = zip_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");

    fs::create_dir_all(dest_dir)?;
    let target = dest_dir.join(format!("{}_{}", zip_stem, member_name));
    let mut out = File::create(&target)?;
    io::copy(&mut entry, &mut out)?;
    Ok(target)
}

/// Extract the given image members under `dest_dir`, preserving each member's
/// archive-relative subpath. Per-member failures are logged and skipped; the
/// archive itself being unreadable is an error.
pub fn extract_images(
    zip_path: &Path,
    members: &[String],
    dest_dir: &Path,
    log: &LogSink<'_>,
) -> Result<Vec<ImageCandidate>> {
    let mut archive = open_archive(zip_path)?;
    let origin = zip_path.display().to_string();
    let mut candidates = Vec::new();

    for member in members {
        let Some(index) = member_index(&mut archive, member) else {
            log(&format!("member vanished from {}: {}", origin, member));
            continue;
        };
        let mut entry = match archive.by_index(index) {
            Ok(e) => e,
            Err(e) => {
                log(&format!("could not read {} from {}: {}", member, origin, e));
                continue;
            }
        };
        let Some(rel) = entry.enclosed_name() else {
            log(&format!("skipping unsafe member path: {}", member));
            continue;
        };
        let target = dest_dir.join(rel);
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log(&format!("could not create {}: {}", parent.display(), e));
                continue;
            }
        }
        let written = File::create(&target)
            .and_then(|mut out| io::copy(&mut entry, &mut out));
        match written {
            Ok(_) => candidates.push(ImageCandidate::from_path(target, Some(origin.clone()))),
            Err(e) => log(&format!("could not extract {}: {}", member, e)),
        }
    }

    Ok(candidates)
}

pub mod correlate;
pub mod error;
pub mod image_scan;
pub mod metadata;
pub mod report;
pub mod store;
pub mod timestamp;
pub mod zip_scan;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use error::{Error, Result};
pub use timestamp::Zone;

/// Options for the primary pass: find the one usable trash log inside the
/// root folder's archives and turn it into a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Folder containing ZIP archives, searched recursively.
    pub root: PathBuf,
    /// Where the report CSV is written.
    pub report_path: PathBuf,
    /// When set, extracted databases are kept here instead of the scratch
    /// directory and survive the pass.
    #[serde(default)]
    pub extracted_db_dir: Option<PathBuf>,
    /// East-of-UTC offset in seconds for epoch interpretation and the
    /// localized deletion column; `None` uses the process-local zone.
    #[serde(default)]
    pub utc_offset_secs: Option<i32>,
}

/// Options for the secondary pass: exiftool over every image under the root,
/// loose or inside trash-marked archive paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataOptions {
    pub root: PathBuf,
    /// Path to the exiftool executable.
    pub exiftool: PathBuf,
    /// Directory receiving the metadata CSV.
    pub output_dir: PathBuf,
}

/// What the primary pass accomplished. `processed_archive` is `None` when no
/// archive held both a verifiable deletion log and images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessReport {
    pub archives_scanned: u64,
    pub processed_archive: Option<PathBuf>,
    pub rows_enriched: u64,
    pub images_matched: u64,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub images_processed: u64,
    pub metadata_csv: PathBuf,
}

/// Type alias for progress callback: (stage, done, total, message).
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Line-oriented status sink. Core logic never writes to a process-wide
/// logger; callers wanting silence pass a no-op closure.
pub type LogSink<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Throttled progress reporter — emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - std::time::Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap();
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the primary pass. The scratch directory lives exactly as long as this
/// call: the `TempDir` guard deletes it on every exit path, and the explicit
/// close at the end routes deletion failures to the log without changing the
/// pass outcome.
pub fn process(
    options: &ProcessOptions,
    log: &LogSink<'_>,
    progress: &ProgressCallback,
) -> Result<ProcessReport> {
    let tp = ThrottledProgress::new(progress);
    let zone = Zone::from_offset_secs(options.utc_offset_secs);
    let scratch = tempfile::tempdir()?;

    let result = process_archives(options, zone, scratch.path(), log, &tp);

    if let Err(e) = scratch.close() {
        log(&format!("could not delete scratch folder: {}", e));
    }
    result
}

fn process_archives(
    options: &ProcessOptions,
    zone: Zone,
    scratch: &Path,
    log: &LogSink<'_>,
    tp: &ThrottledProgress,
) -> Result<ProcessReport> {
    let archives = zip_scan::find_archives(&options.root);
    let mut outcome = ProcessReport::default();

    let db_dir = match &options.extracted_db_dir {
        Some(dir) => dir.clone(),
        None => scratch.join("dbs"),
    };

    for zip_path in &archives {
        outcome.archives_scanned += 1;
        log(&format!("scanning archive: {}", zip_path.display()));

        let pairing = match zip_scan::read_pairing(zip_path) {
            Ok(pairing) => pairing,
            Err(e) => {
                log(&format!("skipping archive: {}", e));
                continue;
            }
        };
        if pairing.db_members.is_empty() {
            log("no deletion-log database in this archive");
            continue;
        }

        for db_member in &pairing.db_members {
            let db_path = match zip_scan::extract_database(zip_path, db_member, &db_dir) {
                Ok(path) => path,
                Err(e) => {
                    log(&format!("could not extract {}: {}", db_member, e));
                    continue;
                }
            };
            log(&format!("extracted database: {}", db_path.display()));

            let mut store = match store::DeletionLog::open(&db_path) {
                Ok(store) => store,
                Err(e) => {
                    log(&format!("skipping candidate: {}", e));
                    continue;
                }
            };

            if pairing.image_members.is_empty() {
                log("no image candidates alongside this database");
                continue;
            }

            let zip_stem = zip_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("archive");
            let image_dir = scratch.join("img").join(zip_stem);
            let candidates =
                match zip_scan::extract_images(zip_path, &pairing.image_members, &image_dir, log)
                {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        log(&format!("could not extract images: {}", e));
                        continue;
                    }
                };

            let reader = metadata::exif::ExifReader::new();
            let stats = correlate::enrich_log(&mut store, &candidates, &reader, zone, log, tp)?;
            report::export_enriched_log(&store, &options.report_path, zone)?;
            log(&format!(
                "report written to {}",
                options.report_path.display()
            ));

            outcome.processed_archive = Some(zip_path.clone());
            outcome.rows_enriched = stats.rows_written;
            outcome.images_matched = stats.images_matched;
            outcome.report_path = Some(options.report_path.clone());
            // First archive with a usable pairing wins; this is not a batch
            // job over the whole tree.
            return Ok(outcome);
        }
    }

    log("no archive with both a usable deletion log and image files was found");
    Ok(outcome)
}

/// Run the secondary pass: one exiftool invocation per discovered image,
/// loose files first, then trash-marked archive members. Accumulates over
/// the whole tree; there is no early exit.
pub fn metadata_pass(
    options: &MetadataOptions,
    log: &LogSink<'_>,
    progress: &ProgressCallback,
) -> Result<MetadataSummary> {
    let tp = ThrottledProgress::new(progress);
    fs::create_dir_all(&options.output_dir)?;
    let scratch = tempfile::Builder::new().prefix("exif_trash_").tempdir()?;

    let result = run_metadata_pass(options, scratch.path(), log, &tp);

    if let Err(e) = scratch.close() {
        log(&format!("could not delete scratch folder: {}", e));
    }
    result
}

fn run_metadata_pass(
    options: &MetadataOptions,
    scratch: &Path,
    log: &LogSink<'_>,
    tp: &ThrottledProgress,
) -> Result<MetadataSummary> {
    log(&format!("scanning: {}", options.root.display()));

    let mut images: Vec<zip_scan::ImageCandidate> = image_scan::find_loose_images(&options.root)
        .into_iter()
        .map(|path| zip_scan::ImageCandidate::from_path(path, None))
        .collect();
    for (i, zip_path) in zip_scan::find_archives(&options.root).iter().enumerate() {
        let dest = scratch.join(format!("zip-{}", i));
        images.extend(image_scan::extract_trash_members(zip_path, &dest, log));
    }
    log(&format!("found {} total image files", images.len()));

    let client = metadata::exiftool::ExiftoolClient::new(&options.exiftool);
    let total = images.len() as u64;
    let mut rows = Vec::with_capacity(images.len());
    for (i, candidate) in images.iter().enumerate() {
        let fields = match client.extract(&candidate.path) {
            Ok(fields) => fields,
            Err(e) => {
                log(&format!(
                    "metadata extraction failed for {}: {}",
                    candidate.path.display(),
                    e
                ));
                HashMap::new()
            }
        };
        rows.push(metadata_row(candidate, &fields));
        tp.report("metadata", i as u64, total, &candidate.stem);
    }

    let metadata_csv = options.output_dir.join(report::METADATA_CSV);
    report::write_metadata_csv(&rows, &metadata_csv)?;
    log(&format!("metadata written to: {}", metadata_csv.display()));

    Ok(MetadataSummary {
        images_processed: total,
        metadata_csv,
    })
}

fn metadata_row(
    candidate: &zip_scan::ImageCandidate,
    fields: &HashMap<String, String>,
) -> report::MetadataRow {
    let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
    // Zipped origins render as "<archive> > <extracted path>" for provenance.
    let file_path = match &candidate.origin_archive {
        Some(origin) => format!("{} > {}", origin, candidate.path.display()),
        None => candidate.path.display().to_string(),
    };
    report::MetadataRow {
        date_created: field("DateTimeOriginal"),
        date_modified: field("ModifyDate"),
        camera: field("Model"),
        title: field("Title"),
        extension: field("FileTypeExtension"),
        file_path,
    }
}

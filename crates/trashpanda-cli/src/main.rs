use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use trashpanda_core::report;
use trashpanda_core::{MetadataOptions, ProcessOptions, Zone};

#[derive(Parser)]
#[command(
    name = "trashpanda",
    version,
    about = "Recover and correlate deleted-file metadata from Android gallery trash archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the first archive with a usable deletion log and write a report
    Scan {
        /// Folder containing ZIP archives
        root: PathBuf,

        /// Report CSV path
        #[arg(short, long, default_value = report::REPORT_CSV)]
        report: PathBuf,

        /// Keep extracted databases in this directory instead of scratch
        #[arg(long)]
        keep_dbs: Option<PathBuf>,

        /// Fixed UTC offset for epoch conversion, e.g. +09:00 (default: local)
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        utc_offset: Option<i32>,
    },

    /// Run exiftool over every image under the root, loose or inside
    /// trash-marked archive paths, and write a metadata CSV
    Metadata {
        root: PathBuf,

        /// Path to the exiftool executable
        #[arg(long)]
        exiftool: PathBuf,

        /// Output directory
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,
    },

    /// Export a deletion-log database to CSV
    ExportLog {
        db: PathBuf,

        #[arg(short, long, default_value = report::TRASH_LOG_CSV)]
        out: PathBuf,

        /// Fixed UTC offset for the localized deletion column
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        utc_offset: Option<i32>,
    },

    /// Merge a metadata CSV against an exported deletion log
    Merge {
        #[arg(long)]
        metadata: PathBuf,

        #[arg(long)]
        trash_log: PathBuf,

        #[arg(short, long, default_value = report::MERGED_CSV)]
        out: PathBuf,
    },
}

/// Parse a `±HH:MM` offset into east-of-UTC seconds.
fn parse_offset(s: &str) -> Result<i32, String> {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| "expected ±HH:MM".to_string())?;
    let hours: i32 = hours.parse().map_err(|_| "bad hours".to_string())?;
    let minutes: i32 = minutes.parse().map_err(|_| "bad minutes".to_string())?;
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err("offset out of range".to_string());
    }
    Ok(sign * (hours * 3600 + minutes * 60))
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{prefix:>9} [{bar:40}] {pos}/{len} {msg}",
    )?);
    Ok(bar)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = Instant::now();

    match cli.command {
        Command::Scan {
            root,
            report,
            keep_dbs,
            utc_offset,
        } => {
            let options = ProcessOptions {
                root,
                report_path: report,
                extracted_db_dir: keep_dbs,
                utc_offset_secs: utc_offset,
            };
            let bar = progress_bar()?;
            let log = {
                let bar = bar.clone();
                move |msg: &str| bar.println(format!("[LOG] {}", msg))
            };
            let progress = {
                let bar = bar.clone();
                move |stage: &str, current: u64, total: u64, message: &str| {
                    bar.set_length(total);
                    bar.set_prefix(stage.to_string());
                    bar.set_position(current + 1);
                    bar.set_message(message.to_string());
                }
            };

            let result = trashpanda_core::process(&options, &log, &progress)?;
            bar.finish_and_clear();

            match &result.processed_archive {
                Some(archive) => eprintln!(
                    "Done! {} rows enriched, {} images matched, from {} ({:.2}s)",
                    result.rows_enriched,
                    result.images_matched,
                    archive.display(),
                    t_total.elapsed().as_secs_f64()
                ),
                None => eprintln!(
                    "No archive with both a valid deletion log and image files ({} scanned)",
                    result.archives_scanned
                ),
            }
        }

        Command::Metadata {
            root,
            exiftool,
            out_dir,
        } => {
            let options = MetadataOptions {
                root,
                exiftool,
                output_dir: out_dir,
            };
            let bar = progress_bar()?;
            let log = {
                let bar = bar.clone();
                move |msg: &str| bar.println(format!("[LOG] {}", msg))
            };
            let progress = {
                let bar = bar.clone();
                move |stage: &str, current: u64, total: u64, message: &str| {
                    bar.set_length(total);
                    bar.set_prefix(stage.to_string());
                    bar.set_position(current + 1);
                    bar.set_message(message.to_string());
                }
            };

            let summary = trashpanda_core::metadata_pass(&options, &log, &progress)?;
            bar.finish_and_clear();
            eprintln!(
                "Done! {} images processed, metadata at {} ({:.2}s)",
                summary.images_processed,
                summary.metadata_csv.display(),
                t_total.elapsed().as_secs_f64()
            );
        }

        Command::ExportLog {
            db,
            out,
            utc_offset,
        } => {
            let rows =
                report::export_deletion_log(&db, &out, Zone::from_offset_secs(utc_offset))?;
            eprintln!("Done! {} rows exported to {}", rows, out.display());
        }

        Command::Merge {
            metadata,
            trash_log,
            out,
        } => {
            let rows = report::merge_reports(&metadata, &trash_log, &out)?;
            eprintln!("Done! {} merged rows written to {}", rows, out.display());
        }
    }

    Ok(())
}

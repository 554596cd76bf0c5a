use std::sync::LazyLock;

use chrono::{FixedOffset, Local, NaiveDateTime, TimeZone};
use regex::Regex;

/// Canonical textual form for every derived timestamp in the system.
pub const CANONICAL_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Time zone used when interpreting bare epoch runs and when localizing
/// deletion times. `Local` is the process zone; `Fixed` pins an offset so
/// results are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    /// Build from an east-of-UTC offset in seconds; `None` or an out-of-range
    /// offset means the process-local zone.
    pub fn from_offset_secs(secs: Option<i32>) -> Zone {
        match secs.and_then(FixedOffset::east_opt) {
            Some(off) => Zone::Fixed(off),
            None => Zone::Local,
        }
    }

    /// Render an epoch-second instant as a canonical wall-clock string.
    /// Returns `None` for instants outside chrono's representable range.
    pub fn epoch_to_canonical(&self, secs: i64) -> Option<String> {
        match self {
            Zone::Local => Local
                .timestamp_opt(secs, 0)
                .single()
                .map(|dt| dt.format(CANONICAL_FORMAT).to_string()),
            Zone::Fixed(off) => off
                .timestamp_opt(secs, 0)
                .single()
                .map(|dt| dt.format(CANONICAL_FORMAT).to_string()),
        }
    }
}

pub fn canonical(dt: &NaiveDateTime) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

static RE_YMD_HMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8})[-_](\d{6,8})").unwrap());
static RE_YMD_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})-(\d{6,8})").unwrap());
static RE_EPOCH_MS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{13}").unwrap());
static RE_EPOCH_S: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{10}").unwrap());

fn parse_compact(date_part: &str, time_part: &str) -> Option<NaiveDateTime> {
    // Time fragments run 6-8 digits; only the first six are significant.
    let compact = format!("{}{}", date_part, &time_part[..6]);
    NaiveDateTime::parse_from_str(&compact, "%Y%m%d%H%M%S").ok()
}

/// Scan `text` for every recognized timestamp fragment and canonicalize each.
///
/// All four patterns are applied independently over the whole input, so a
/// single digit run can legitimately produce more than one result (a 13-digit
/// run also fires the 10-digit pattern on its prefix). Matches that do not
/// form a valid date, or epochs outside the representable range, are skipped.
pub fn scan_timestamps(text: &str, zone: Zone) -> Vec<String> {
    let mut out = Vec::new();

    for caps in RE_YMD_HMS.captures_iter(text) {
        if let Some(dt) = parse_compact(&caps[1], &caps[2]) {
            out.push(canonical(&dt));
        }
    }

    for caps in RE_YMD_DASH.captures_iter(text) {
        let date = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
        if let Some(dt) = parse_compact(&date, &caps[4]) {
            out.push(canonical(&dt));
        }
    }

    for m in RE_EPOCH_MS.find_iter(text) {
        if let Ok(ms) = m.as_str().parse::<i64>() {
            if let Some(s) = zone.epoch_to_canonical(ms / 1000) {
                out.push(s);
            }
        }
    }

    for m in RE_EPOCH_S.find_iter(text) {
        if let Ok(secs) = m.as_str().parse::<i64>() {
            if let Some(s) = zone.epoch_to_canonical(secs) {
                out.push(s);
            }
        }
    }

    out
}

/// Joined form written to the deletion log's `converted_title` column.
/// `None` when no pattern produced a valid timestamp.
pub fn convert_timestamps(text: &str, zone: Zone) -> Option<String> {
    let found = scan_timestamps(text, zone);
    if found.is_empty() {
        None
    } else {
        Some(found.join(", "))
    }
}

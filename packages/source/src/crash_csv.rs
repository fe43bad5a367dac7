//! Raw crash CSV normalization.
//!
//! The municipal crash export is a wide CSV (49 columns) of which only a
//! handful matter here. [`CrashCsvLayout`] names those columns; the defaults
//! match the export the pipeline was built against and can be overridden
//! from the config file when a different vintage shifts the columns.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crash_map_crash_models::{CrashId, Direction, InjuryCounts, NormalizedCrash};
use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::parsing::{parse_crash_date, parse_distance, parse_id, parse_severity};

/// Zero-based column positions of the fields used from the raw crash CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashCsvLayout {
    /// Crash report id.
    pub crash_id: usize,
    /// Crash date, if the export has one.
    pub date: Option<usize>,
    /// Reference intersection number (`intnum`).
    pub intersection_number: usize,
    /// Direction from the intersection (`"North Of"`, `"At"`, ...).
    pub direction: usize,
    /// Distance from the intersection in feet.
    pub distance: usize,
    /// Fatalities.
    pub fatal: usize,
    /// Major injuries.
    pub major: usize,
    /// Moderate injuries.
    pub moderate: usize,
    /// Minor injuries.
    pub minor: usize,
    /// Number of fields every row must have to pass validation.
    pub field_count: usize,
}

impl Default for CrashCsvLayout {
    fn default() -> Self {
        Self {
            crash_id: 0,
            date: Some(1),
            intersection_number: 5,
            direction: 8,
            distance: 9,
            fatal: 44,
            major: 45,
            moderate: 46,
            minor: 47,
            field_count: 49,
        }
    }
}

/// Reads and normalizes every crash in the CSV file at `path`.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or a row has an
/// unparseable crash id or severity cell.
pub fn read_crash_csv(
    path: &Path,
    layout: &CrashCsvLayout,
) -> Result<BTreeMap<CrashId, NormalizedCrash>, SourceError> {
    log::info!("Reading crash records from {}", path.display());
    let file = std::fs::File::open(path)?;
    let crashes = read_crashes(file, layout)?;
    log::info!("Normalized {} crash records", crashes.len());
    Ok(crashes)
}

/// Reads and normalizes crashes from any reader producing the raw CSV
/// (header row included).
///
/// A crash id seen twice keeps the later row.
///
/// # Errors
///
/// Returns [`SourceError`] on CSV decoding errors or malformed rows.
pub fn read_crashes<R: Read>(
    reader: R,
    layout: &CrashCsvLayout,
) -> Result<BTreeMap<CrashId, NormalizedCrash>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut crashes = BTreeMap::new();

    for (i, result) in csv_reader.records().enumerate() {
        let record = result?;
        // +2: one for the header row, one for 1-based line numbers.
        let line = i + 2;
        let crash = normalize_record(&record, layout, line)?;
        if let Some(previous) = crashes.insert(crash.id, crash) {
            log::warn!("Duplicate crash id {} on line {line}", previous.id);
        }
    }

    Ok(crashes)
}

/// Normalizes a single raw CSV row.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if the crash id is missing or a severity
/// cell is not a number.
pub fn normalize_record(
    record: &csv::StringRecord,
    layout: &CrashCsvLayout,
    line: usize,
) -> Result<NormalizedCrash, SourceError> {
    let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

    let id = parse_id(cell(layout.crash_id)).map(CrashId).ok_or_else(|| {
        SourceError::schema(format!(
            "line {line}: invalid crash id {:?}",
            cell(layout.crash_id)
        ))
    })?;

    let severity = |idx: usize, label: &str| {
        parse_severity(cell(idx)).map_err(|bad| {
            SourceError::schema(format!("line {line}: invalid {label} count {bad:?}"))
        })
    };
    let injuries = InjuryCounts {
        fatal: severity(layout.fatal, "fatal")?,
        major: severity(layout.major, "major injury")?,
        moderate: severity(layout.moderate, "moderate injury")?,
        minor: severity(layout.minor, "minor injury")?,
    };

    let (direction, distance_ft) =
        normalize_direction(cell(layout.direction), cell(layout.distance));

    Ok(NormalizedCrash {
        id,
        intersection_number: parse_id(cell(layout.intersection_number)),
        direction,
        distance_ft,
        date: layout.date.and_then(|idx| parse_crash_date(cell(idx))),
        injuries,
    })
}

/// Reconciles the raw direction and distance cells.
///
/// A distance of exactly `"0"` means the crash happened in the intersection
/// regardless of the direction cell, and an `At` crash always has distance
/// zero.
#[must_use]
pub fn normalize_direction(raw_direction: &str, raw_distance: &str) -> (Option<Direction>, Option<u32>) {
    let direction = if raw_distance.trim() == "0" {
        Some(Direction::At)
    } else {
        Direction::from_raw(raw_direction)
    };

    match direction {
        Some(Direction::At) => (direction, Some(0)),
        Some(_) => (direction, parse_distance(raw_distance)),
        None => (None, parse_distance(raw_distance)),
    }
}

/// Checks that every row of the crash CSV has exactly
/// [`CrashCsvLayout::field_count`] fields. Returns the number of data rows.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] naming the first offending line, or an
/// I/O / CSV error if the file cannot be read.
pub fn validate_crash_csv(path: &Path, layout: &CrashCsvLayout) -> Result<u64, SourceError> {
    let file = std::fs::File::open(path)?;
    validate_crashes(file, layout)
}

/// Reader-based variant of [`validate_crash_csv`].
///
/// # Errors
///
/// See [`validate_crash_csv`].
pub fn validate_crashes<R: Read>(reader: R, layout: &CrashCsvLayout) -> Result<u64, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = 0u64;
    for (i, result) in csv_reader.records().enumerate() {
        let record = result?;
        if record.len() != layout.field_count {
            return Err(SourceError::schema(format!(
                "line {}: expected {} fields, found {}",
                i + 1,
                layout.field_count,
                record.len()
            )));
        }
        rows += 1;
    }

    Ok(rows.saturating_sub(1))
}

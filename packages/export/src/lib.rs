#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File outputs for segment, road, and crash-location data.
//!
//! Every writer stages its output to `<file>.tmp` in the target directory
//! and renames it into place only once the whole file has been written, so
//! an interrupted run never leaves a truncated output behind.

pub mod crashes;
pub mod roads;
pub mod segments;

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Per-segment statistics table.
pub const STREET_DATA_CSV: &str = "street_data.csv";
/// Segment-to-crash relation.
pub const STREET_TO_CRASH_CSV: &str = "street_to_crash.csv";
/// Per-segment statistics with contributing crashes.
pub const STREET_DATA_JSON: &str = "street_data.json";
/// Per-road membership and statistics.
pub const ROADS_JSON: &str = "roads.json";
/// Per-road table with `GeoJSON` geometry.
pub const ROADS_CSV: &str = "roads.csv";
/// Crash locations keyed by crash id.
pub const CRASH_LOCATIONS_JSON: &str = "crash_locations.json";
/// Crash locations table.
pub const CRASH_LOCATIONS_CSV: &str = "crash_locations.csv";
/// One point per killed or seriously injured person.
pub const KSI_CSV: &str = "ksi.csv";
/// One point per injured person.
pub const INJURED_CSV: &str = "injured.csv";

/// Errors that can occur while writing outputs.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `dir/file_name` via a `.tmp` sibling and an atomic rename.
///
/// The temporary file is removed if `write` fails.
fn write_atomic(
    dir: &Path,
    file_name: &str,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), ExportError>,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let tmp_path = dir.join(format!("{file_name}.tmp"));

    let result = File::create(&tmp_path)
        .map_err(ExportError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            Ok(())
        });

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, &path)?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}

fn write_csv<T: Serialize>(
    dir: &Path,
    file_name: &str,
    rows: impl IntoIterator<Item = T>,
) -> Result<PathBuf, ExportError> {
    write_atomic(dir, file_name, |out| {
        let mut writer = csv::Writer::from_writer(out);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<PathBuf, ExportError> {
    write_atomic(dir, file_name, |out| {
        serde_json::to_writer_pretty(out, value)?;
        Ok(())
    })
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::PathBuf;

    /// Fresh scratch directory unique to this process and `name`.
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "crash_map_export_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

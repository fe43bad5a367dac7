#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Input adapters for the crash map pipeline.
//!
//! [`crash_csv`] normalizes the raw municipal crash export into
//! [`crash_map_crash_models::NormalizedCrash`] records, and [`streets`]
//! loads the street centerline and intersection layers into an in-memory
//! [`streets::StreetNetwork`]. Both are read once per run; any failure here
//! is fatal for the whole run.

pub mod crash_csv;
pub mod parsing;
pub mod progress;
pub mod streets;

/// Errors that can occur while reading pipeline inputs.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parse or conversion error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The input does not have the expected shape.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }
}

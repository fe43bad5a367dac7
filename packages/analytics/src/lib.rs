#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash statistics for street segments and merged roads.
//!
//! Two passes run over a static snapshot:
//!
//! 1. [`aggregate`] folds geocoded crashes into per-segment
//!    [`crash_map_analytics_models::SegmentStats`].
//! 2. [`roads`] partitions segments into roads (connected runs of
//!    same-named, same-class segments), merges their geometry through
//!    [`geometry`], and rolls the segment statistics up per road.

pub mod aggregate;
pub mod geometry;
pub mod roads;
pub mod union_find;

use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Geometry merge failed.
    #[error("Geometry error: {message}")]
    Geometry {
        /// Description of what went wrong.
        message: String,
    },
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash geocoding against the street network.
//!
//! Crash reports locate a crash as "N feet North of intersection X". The
//! [`SegmentGeocoder`] trait turns that into the street segments the crash
//! touches and an approximate point. [`network::NetworkGeocoder`] is the
//! in-memory implementation backed by a
//! [`crash_map_source::streets::StreetNetwork`].
//!
//! Unresolvable crashes are not errors: they touch zero segments and have
//! no point, and are simply left out of the statistics.

pub mod bearing;
pub mod network;

use std::collections::BTreeMap;
use std::sync::Arc;

use crash_map_crash_models::{CrashId, NormalizedCrash};
use crash_map_source::progress::ProgressCallback;
use crash_map_street_models::{IntersectionId, SegmentId};
use geo::Point;

/// A crash resolved to a point on the street network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashLocation {
    /// Internal id of the reference intersection.
    pub intersection: IntersectionId,
    /// Estimated crash point in projected feet.
    pub point: Point<f64>,
}

/// Resolves crashes against street segments.
pub trait SegmentGeocoder {
    /// Street segments touched by a crash. Empty when the crash cannot be
    /// resolved.
    fn segments_for(&self, crash: &NormalizedCrash) -> Vec<SegmentId>;

    /// Estimated crash point, or `None` when the crash cannot be resolved.
    fn locate(&self, crash: &NormalizedCrash) -> Option<CrashLocation>;
}

/// Locates every crash, logging how many could and could not be placed.
#[must_use]
pub fn locate_all(
    crashes: &BTreeMap<CrashId, NormalizedCrash>,
    geocoder: &dyn SegmentGeocoder,
    progress: &Arc<dyn ProgressCallback>,
) -> BTreeMap<CrashId, Option<CrashLocation>> {
    progress.set_total(crashes.len() as u64);
    progress.set_message("Locating crashes".to_string());

    let mut found = 0u64;
    let mut located = BTreeMap::new();

    for (id, crash) in crashes {
        let location = geocoder.locate(crash);
        if location.is_some() {
            found += 1;
        }
        located.insert(*id, location);
        progress.inc(1);
    }

    let missing = crashes.len() as u64 - found;
    log::info!("Crash locations found = {found}, not found = {missing}");
    progress.finish(format!("Located {found}/{} crashes", crashes.len()));

    located
}

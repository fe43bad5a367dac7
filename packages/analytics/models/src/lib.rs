#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash statistics types for street segments and merged roads.
//!
//! Counts are accumulated per segment in [`SegmentStats`] and rolled up per
//! road into [`RoadStats`]. Per-mile [`Rates`] are derived only after
//! accumulation finishes and are `None` whenever the length is unknown or
//! zero.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use crash_map_crash_models::{CrashId, NormalizedCrash};
use crash_map_street_models::{IntersectionId, SegmentId, StreetClassification};
use geo::MultiLineString;
use serde::{Deserialize, Serialize};

/// Severity totals of one crash as recorded against a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashContribution {
    /// Date of the crash, if known.
    pub date: Option<NaiveDate>,
    /// Killed or seriously injured.
    pub ksi: u32,
    /// Injured at any severity.
    pub injured: u32,
}

impl From<&NormalizedCrash> for CrashContribution {
    fn from(crash: &NormalizedCrash) -> Self {
        Self {
            date: crash.date,
            ksi: crash.ksi(),
            injured: crash.injured(),
        }
    }
}

/// Per-mile crash rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// KSI per mile.
    #[serde(rename = "ksi/mile")]
    pub ksi_per_mile: Option<f64>,
    /// Injured per mile.
    #[serde(rename = "injured/mile")]
    pub injured_per_mile: Option<f64>,
    /// Crashes per mile.
    #[serde(rename = "crashes/mile")]
    pub crashes_per_mile: Option<f64>,
}

impl Rates {
    /// Divides each count by `length_miles`.
    ///
    /// Every rate is `None` when the length is missing, zero, negative, or
    /// non-finite.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(ksi: u64, injured: u64, crashes: u64, length_miles: Option<f64>) -> Self {
        let Some(length) = length_miles.filter(|l| l.is_finite() && *l > 0.0) else {
            return Self::default();
        };
        Self {
            ksi_per_mile: Some(ksi as f64 / length),
            injured_per_mile: Some(injured as f64 / length),
            crashes_per_mile: Some(crashes as f64 / length),
        }
    }
}

/// Crash accumulator for a single street segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Segment the statistics belong to.
    pub segment_id: SegmentId,
    /// Segment length in miles, `None` when unknown.
    pub length_miles: Option<f64>,
    /// Number of distinct crashes touching the segment.
    pub total_crashes: u64,
    /// Sum of injured over those crashes.
    pub injured: u64,
    /// Sum of KSI over those crashes.
    pub ksi: u64,
    /// Contributing crashes keyed by id.
    pub crashes: BTreeMap<CrashId, CrashContribution>,
}

impl SegmentStats {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new(segment_id: SegmentId, length_miles: Option<f64>) -> Self {
        Self {
            segment_id,
            length_miles,
            total_crashes: 0,
            injured: 0,
            ksi: 0,
            crashes: BTreeMap::new(),
        }
    }

    /// Records a crash against the segment.
    ///
    /// Returns `false` (and changes nothing) if the crash was already
    /// recorded.
    pub fn record(&mut self, crash_id: CrashId, contribution: CrashContribution) -> bool {
        if self.crashes.contains_key(&crash_id) {
            return false;
        }
        self.crashes.insert(crash_id, contribution);
        self.total_crashes += 1;
        self.injured += u64::from(contribution.injured);
        self.ksi += u64::from(contribution.ksi);
        true
    }

    /// Per-mile rates over the accumulated totals.
    #[must_use]
    pub fn rates(&self) -> Rates {
        Rates::compute(self.ksi, self.injured, self.total_crashes, self.length_miles)
    }

    /// Flat row for the per-segment statistics table.
    #[must_use]
    pub const fn row(&self) -> SegmentStatsRow {
        SegmentStatsRow {
            segment_id: self.segment_id,
            total_crashes: self.total_crashes,
            total_injured: self.injured,
            total_ksi: self.ksi,
        }
    }
}

/// Row of the per-segment statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStatsRow {
    /// Segment id.
    #[serde(rename = "id")]
    pub segment_id: SegmentId,
    /// Distinct crashes.
    pub total_crashes: u64,
    /// Injured total.
    #[serde(rename = "injured")]
    pub total_injured: u64,
    /// KSI total.
    #[serde(rename = "ksi")]
    pub total_ksi: u64,
}

/// Row of the segment-to-crash relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentCrashRow {
    /// Segment id.
    #[serde(rename = "street_id")]
    pub segment_id: SegmentId,
    /// Crash id.
    pub crash_id: CrashId,
}

/// Identifier of a road within a single run.
///
/// Ids are assigned deterministically but are not stable across runs with
/// different inputs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoadId(pub u64);

impl std::fmt::Display for RoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a road: the shared tag of its segments, or `Mixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadClassification {
    /// Every member segment has this tag.
    Single(StreetClassification),
    /// Member segments disagree.
    Mixed,
}

impl RoadClassification {
    /// Resolves the classification of a set of member tags.
    ///
    /// An empty set resolves to `Single(Unknown)`.
    #[must_use]
    pub fn resolve(tags: &BTreeSet<StreetClassification>) -> Self {
        let mut iter = tags.iter();
        match (iter.next(), iter.next()) {
            (Some(tag), None) => Self::Single(*tag),
            (None, _) => Self::Single(StreetClassification::Unknown),
            (Some(_), Some(_)) => Self::Mixed,
        }
    }
}

impl std::fmt::Display for RoadClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(tag) => write!(f, "{tag}"),
            Self::Mixed => write!(f, "Mixed"),
        }
    }
}

impl Serialize for RoadClassification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Crash roll-up for a road.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadStats {
    /// KSI over the distinct crashes on the road.
    pub ksi: u64,
    /// Injured over the distinct crashes on the road.
    pub injured: u64,
    /// Distinct crashes on the road.
    pub crashes: u64,
    /// Summed length of members with a known length.
    pub length_miles: Option<f64>,
    /// Per-mile rates.
    #[serde(flatten)]
    pub rates: Rates,
}

/// A maximal connected run of same-named segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    /// Road id.
    pub id: RoadId,
    /// Shared display name.
    pub name: String,
    /// Resolved classification.
    pub classification: RoadClassification,
    /// Distinct classification tags of the member segments.
    pub classifications: BTreeSet<StreetClassification>,
    /// Member segments.
    pub segments: BTreeSet<SegmentId>,
    /// Union of member endpoints.
    pub intersections: BTreeSet<IntersectionId>,
    /// Merged centerline, `None` when no member has geometry.
    pub geometry: Option<MultiLineString<f64>>,
    /// Crash statistics.
    pub stats: RoadStats,
}

impl Road {
    /// Whether any member segment belongs to the reported road classes.
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        self.classifications.iter().any(|c| c.is_relevant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(ksi: u32, injured: u32) -> CrashContribution {
        CrashContribution {
            date: None,
            ksi,
            injured,
        }
    }

    #[test]
    fn rates_are_none_without_length() {
        assert_eq!(Rates::compute(3, 4, 5, None), Rates::default());
        assert_eq!(Rates::compute(3, 4, 5, Some(0.0)), Rates::default());
        assert_eq!(Rates::compute(3, 4, 5, Some(f64::NAN)), Rates::default());
    }

    #[test]
    fn rates_divide_by_length() {
        let rates = Rates::compute(1, 2, 4, Some(2.0));
        assert!((rates.ksi_per_mile.unwrap() - 0.5).abs() < f64::EPSILON);
        assert!((rates.injured_per_mile.unwrap() - 1.0).abs() < f64::EPSILON);
        assert!((rates.crashes_per_mile.unwrap() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recording_same_crash_twice_is_a_no_op() {
        let mut stats = SegmentStats::new(SegmentId(1), Some(1.0));
        assert!(stats.record(CrashId(9), contribution(1, 2)));
        assert!(!stats.record(CrashId(9), contribution(1, 2)));
        assert_eq!(stats.total_crashes, 1);
        assert_eq!(stats.ksi, 1);
        assert_eq!(stats.injured, 2);
    }

    #[test]
    fn classification_resolution() {
        let one: BTreeSet<_> = [StreetClassification::Major].into();
        assert_eq!(
            RoadClassification::resolve(&one),
            RoadClassification::Single(StreetClassification::Major)
        );

        let two: BTreeSet<_> = [StreetClassification::Major, StreetClassification::Minor].into();
        assert_eq!(RoadClassification::resolve(&two), RoadClassification::Mixed);
        assert_eq!(RoadClassification::Mixed.to_string(), "Mixed");
        assert_eq!(
            RoadClassification::Single(StreetClassification::Collector).to_string(),
            "CO"
        );
    }
}

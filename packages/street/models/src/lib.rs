#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Street centerline segment types and classification tags.
//!
//! A [`Segment`] is a single centerline edge between two intersections.
//! Segments are immutable once loaded; everything downstream (crash
//! aggregation, road building) only reads them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of raw length units (feet) in one reporting unit (mile).
pub const FEET_PER_MILE: f64 = 5280.0;

/// Converts a raw length in feet to miles.
///
/// Returns `None` for a missing, zero, negative, or non-finite length so
/// that per-mile rates downstream stay undefined instead of dividing by
/// zero.
#[must_use]
pub fn feet_to_miles(feet: Option<f64>) -> Option<f64> {
    let feet = feet?;
    if !feet.is_finite() || feet <= 0.0 {
        return None;
    }
    Some(feet / FEET_PER_MILE)
}

/// Unique identifier of a street centerline segment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of an intersection (segment endpoint).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IntersectionId(pub u64);

impl std::fmt::Display for IntersectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Functional classification of a street.
///
/// Serialized with the two-letter codes used by the centerline dataset
/// (`CO`, `MA`, `MI`, `EX`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum StreetClassification {
    /// Collector street.
    #[serde(rename = "CO")]
    #[strum(serialize = "CO")]
    Collector,
    /// Major arterial.
    #[serde(rename = "MA")]
    #[strum(serialize = "MA")]
    Major,
    /// Minor street.
    #[serde(rename = "MI")]
    #[strum(serialize = "MI")]
    Minor,
    /// Expressway.
    #[serde(rename = "EX")]
    #[strum(serialize = "EX")]
    Expressway,
    /// Any other non-empty code (ramps, private roads, trails, ...).
    #[serde(rename = "OTHER")]
    #[strum(serialize = "OTHER")]
    Other,
    /// No classification recorded.
    #[serde(rename = "UNKNOWN")]
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl StreetClassification {
    /// Maps a raw `streetclas` code to a classification.
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Self::Unknown;
        };

        match code.to_ascii_uppercase().as_str() {
            "CO" => Self::Collector,
            "MA" => Self::Major,
            "MI" => Self::Minor,
            "EX" => Self::Expressway,
            _ => Self::Other,
        }
    }

    /// Whether streets of this class are part of the reported road network
    /// (collectors, majors, minors and expressways).
    #[must_use]
    pub const fn is_relevant(self) -> bool {
        matches!(
            self,
            Self::Collector | Self::Major | Self::Minor | Self::Expressway
        )
    }
}

/// A street centerline segment between two intersections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Segment identifier.
    pub id: SegmentId,
    /// Display name (`fullname`). Not unique across the city; empty when
    /// the centerline has no name.
    pub name: String,
    /// Intersection at the start of the centerline.
    pub from: IntersectionId,
    /// Intersection at the end of the centerline.
    pub to: IntersectionId,
    /// Functional classification.
    pub classification: StreetClassification,
    /// Length in miles, `None` when the geometry length is unknown or zero.
    pub length_miles: Option<f64>,
}

impl Segment {
    /// Both endpoint intersections, `from` first.
    #[must_use]
    pub const fn endpoints(&self) -> [IntersectionId; 2] {
        [self.from, self.to]
    }

    /// Whether the segment carries a display name. Unnamed segments never
    /// share a name with anything.
    #[must_use]
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_feet_to_miles() {
        let miles = feet_to_miles(Some(2640.0)).unwrap();
        assert!((miles - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_or_missing_length_is_none() {
        assert!(feet_to_miles(None).is_none());
        assert!(feet_to_miles(Some(0.0)).is_none());
        assert!(feet_to_miles(Some(-3.0)).is_none());
        assert!(feet_to_miles(Some(f64::NAN)).is_none());
    }

    #[test]
    fn classification_codes() {
        assert_eq!(
            StreetClassification::from_code(Some("co")),
            StreetClassification::Collector
        );
        assert_eq!(
            StreetClassification::from_code(Some("MA")),
            StreetClassification::Major
        );
        assert_eq!(
            StreetClassification::from_code(Some("RP")),
            StreetClassification::Other
        );
        assert_eq!(
            StreetClassification::from_code(Some("  ")),
            StreetClassification::Unknown
        );
        assert_eq!(
            StreetClassification::from_code(None),
            StreetClassification::Unknown
        );
    }

    #[test]
    fn relevant_classes() {
        assert!(StreetClassification::Expressway.is_relevant());
        assert!(StreetClassification::Minor.is_relevant());
        assert!(!StreetClassification::Other.is_relevant());
        assert!(!StreetClassification::Unknown.is_relevant());
    }

    #[test]
    fn classification_displays_as_code() {
        assert_eq!(StreetClassification::Major.to_string(), "MA");
        assert_eq!(StreetClassification::Unknown.as_ref(), "UNKNOWN");
    }
}

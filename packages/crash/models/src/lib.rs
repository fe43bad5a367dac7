#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Normalized traffic crash records and injury severity definitions.
//!
//! Every raw crash row is normalized into a [`NormalizedCrash`] before any
//! geocoding or aggregation happens. The derived severity measures used
//! throughout the system (KSI and total injured) are defined here so that
//! every consumer computes them the same way.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Unique identifier of a crash report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CrashId(pub u64);

impl std::fmt::Display for CrashId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compass direction of a crash relative to its reference intersection.
///
/// A crash with no usable direction in the source data is represented as
/// `Option::<Direction>::None` rather than a dedicated variant.
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
pub enum Direction {
    /// North of the intersection.
    North,
    /// South of the intersection.
    South,
    /// East of the intersection.
    East,
    /// West of the intersection.
    West,
    /// In the intersection itself (zero distance).
    At,
}

impl Direction {
    /// Normalizes a raw direction cell (`"North Of"`, `"At"`, ...) into a
    /// [`Direction`].
    ///
    /// Returns `None` for blank or unrecognized values.
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim() {
            "At" => Some(Self::At),
            "North Of" => Some(Self::North),
            "South Of" => Some(Self::South),
            "East Of" => Some(Self::East),
            "West Of" => Some(Self::West),
            _ => None,
        }
    }

    /// Compass bearing in degrees clockwise from north, or `None` for
    /// [`Direction::At`].
    #[must_use]
    pub const fn bearing_degrees(self) -> Option<f64> {
        match self {
            Self::North => Some(0.0),
            Self::East => Some(90.0),
            Self::South => Some(180.0),
            Self::West => Some(270.0),
            Self::At => None,
        }
    }
}

/// Number of people injured in a crash, by injury severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjuryCounts {
    /// People killed.
    pub fatal: u32,
    /// People with major (serious) injuries.
    pub major: u32,
    /// People with moderate injuries.
    pub moderate: u32,
    /// People with minor injuries.
    pub minor: u32,
}

impl InjuryCounts {
    /// Killed or seriously injured: `fatal + major`, saturating at
    /// `u32::MAX`.
    #[must_use]
    pub const fn ksi(&self) -> u32 {
        self.fatal.saturating_add(self.major)
    }

    /// Everyone injured at any severity, fatalities included. Saturates at
    /// `u32::MAX`.
    #[must_use]
    pub const fn injured(&self) -> u32 {
        self.ksi()
            .saturating_add(self.moderate)
            .saturating_add(self.minor)
    }
}

/// A crash record after column parsing and direction/severity cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCrash {
    /// Crash report identifier.
    pub id: CrashId,
    /// Number of the nearest reference intersection (`intnum`), if known.
    pub intersection_number: Option<u64>,
    /// Direction from the reference intersection, if known.
    pub direction: Option<Direction>,
    /// Distance from the reference intersection in feet, if known.
    pub distance_ft: Option<u32>,
    /// Date the crash occurred, if parseable.
    pub date: Option<NaiveDate>,
    /// Injury counts by severity.
    pub injuries: InjuryCounts,
}

impl NormalizedCrash {
    /// See [`InjuryCounts::ksi`].
    #[must_use]
    pub const fn ksi(&self) -> u32 {
        self.injuries.ksi()
    }

    /// See [`InjuryCounts::injured`].
    #[must_use]
    pub const fn injured(&self) -> u32 {
        self.injuries.injured()
    }

    /// Whether the crash carries enough location information to be
    /// resolved against the street network.
    #[must_use]
    pub const fn is_locatable(&self) -> bool {
        self.intersection_number.is_some() && self.direction.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ksi_and_injured_derivation() {
        let counts = InjuryCounts {
            fatal: 1,
            major: 2,
            moderate: 3,
            minor: 4,
        };
        assert_eq!(counts.ksi(), 3);
        assert_eq!(counts.injured(), 10);
        assert_eq!(InjuryCounts::default().injured(), 0);
    }

    #[test]
    fn huge_severity_counts_saturate() {
        let counts = InjuryCounts {
            fatal: u32::MAX,
            major: 1,
            moderate: 5,
            minor: 0,
        };
        assert_eq!(counts.ksi(), u32::MAX);
        assert_eq!(counts.injured(), u32::MAX);
    }

    #[test]
    fn normalizes_raw_directions() {
        assert_eq!(Direction::from_raw("North Of"), Some(Direction::North));
        assert_eq!(Direction::from_raw("South Of"), Some(Direction::South));
        assert_eq!(Direction::from_raw("East Of"), Some(Direction::East));
        assert_eq!(Direction::from_raw("West Of"), Some(Direction::West));
        assert_eq!(Direction::from_raw(" At "), Some(Direction::At));
        assert_eq!(Direction::from_raw("Northeast Of"), None);
        assert_eq!(Direction::from_raw(""), None);
    }

    #[test]
    fn direction_display_roundtrip() {
        for dir in [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::At,
        ] {
            let parsed: Direction = dir.to_string().parse().unwrap();
            assert_eq!(parsed, dir);
        }
    }

    #[test]
    fn at_has_no_bearing() {
        assert!(Direction::At.bearing_degrees().is_none());
        assert_eq!(Direction::West.bearing_degrees(), Some(270.0));
    }
}

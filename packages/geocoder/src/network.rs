//! In-memory geocoder backed by a [`StreetNetwork`].
//!
//! Direction matching works on the departure bearing of each segment
//! leaving the reference intersection: a "North Of" crash lands on the
//! segment heading closest to due north, as long as it is within
//! [`MAX_BEARING_DEVIATION_DEGREES`].

use crash_map_crash_models::{Direction, NormalizedCrash};
use crash_map_source::streets::{Intersection, StreetNetwork};
use crash_map_street_models::{Segment, SegmentId};
use geo::Coord;

use crate::bearing::{angular_deviation, initial_bearing, offset, walk};
use crate::{CrashLocation, SegmentGeocoder};

/// Maximum angle between a compass direction and a segment's departure
/// bearing for the segment to count as lying in that direction.
pub const MAX_BEARING_DEVIATION_DEGREES: f64 = 80.0;

/// Direction used to place crashes reported `At` an intersection. The
/// distance is always zero, so this only selects which segment, if any,
/// anchors the point.
const AT_PLACEMENT_DIRECTION: Direction = Direction::South;

/// Geocodes crashes against an in-memory street network.
pub struct NetworkGeocoder<'a> {
    network: &'a StreetNetwork,
}

impl<'a> NetworkGeocoder<'a> {
    /// Creates a geocoder over `network`.
    #[must_use]
    pub const fn new(network: &'a StreetNetwork) -> Self {
        Self { network }
    }

    /// The segment leaving `intersection` whose departure bearing best
    /// matches `direction`.
    #[must_use]
    pub fn segment_in_direction(
        &self,
        intersection: &Intersection,
        direction: Direction,
    ) -> Option<&'a Segment> {
        let target = direction.bearing_degrees()?;

        self.network
            .segments_at(intersection.id)
            .iter()
            .filter_map(|id| self.network.segment(*id))
            .filter_map(|segment| {
                let path = self.departure_path(segment, intersection)?;
                let deviation = angular_deviation(initial_bearing(&path)?, target);
                (deviation < MAX_BEARING_DEVIATION_DEGREES).then_some((segment, deviation))
            })
            .min_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
            .map(|(segment, _)| segment)
    }

    /// The segment's polyline oriented to start at `intersection`.
    ///
    /// Uses the centerline geometry when present, otherwise the straight
    /// line to the opposite endpoint intersection.
    fn departure_path(
        &self,
        segment: &Segment,
        intersection: &Intersection,
    ) -> Option<Vec<Coord<f64>>> {
        let origin = intersection.location.0;

        if let Some(geometry) = self.network.geometry(segment.id) {
            let mut coords: Vec<Coord<f64>> = Vec::new();
            for line in geometry {
                for coord in &line.0 {
                    if coords.last() != Some(coord) {
                        coords.push(*coord);
                    }
                }
            }
            let (first, last) = (*coords.first()?, *coords.last()?);
            if squared_distance(last, origin) < squared_distance(first, origin) {
                coords.reverse();
            }
            return Some(coords);
        }

        let other = if segment.from == intersection.id {
            segment.to
        } else {
            segment.from
        };
        let other = self.network.intersection(other)?;
        Some(vec![origin, other.location.0])
    }

    fn resolve_intersection(&self, crash: &NormalizedCrash) -> Option<&'a Intersection> {
        let number = crash.intersection_number?;
        let intersection = self.network.intersection_by_number(number);
        if intersection.is_none() {
            log::debug!("Crash {}: unknown intersection number {number}", crash.id);
        }
        intersection
    }
}

impl SegmentGeocoder for NetworkGeocoder<'_> {
    fn segments_for(&self, crash: &NormalizedCrash) -> Vec<SegmentId> {
        let Some(direction) = crash.direction else {
            return Vec::new();
        };
        let Some(intersection) = self.resolve_intersection(crash) else {
            return Vec::new();
        };

        match direction {
            Direction::At => self.network.segments_at(intersection.id).to_vec(),
            _ => self
                .segment_in_direction(intersection, direction)
                .map(|s| vec![s.id])
                .unwrap_or_default(),
        }
    }

    fn locate(&self, crash: &NormalizedCrash) -> Option<CrashLocation> {
        let direction = crash.direction?;
        let distance = f64::from(crash.distance_ft?);
        let intersection = self.resolve_intersection(crash)?;

        let direction = if direction == Direction::At {
            AT_PLACEMENT_DIRECTION
        } else {
            direction
        };

        let along_segment = self
            .segment_in_direction(intersection, direction)
            .and_then(|segment| self.departure_path(segment, intersection))
            .and_then(|path| walk(&path, distance));

        let point = match along_segment {
            Some(point) => point,
            None => offset(
                intersection.location,
                direction.bearing_degrees()?,
                distance,
            ),
        };

        Some(CrashLocation {
            intersection: intersection.id,
            point,
        })
    }
}

fn squared_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx.mul_add(dx, dy * dy)
}

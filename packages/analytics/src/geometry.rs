//! Road geometry merging.
//!
//! Member centerlines are folded pairwise in segment-id order through a
//! [`GeometryMerger`]. [`LineMerger`] unions the inputs, drops duplicate
//! lines, and sews lines together at nodes where exactly two line ends
//! meet. Branches and gaps survive as separate parts of the resulting
//! multi-line.

use std::collections::{BTreeMap, BTreeSet};

use crash_map_source::streets::StreetNetwork;
use crash_map_street_models::SegmentId;
use geo::{Coord, Geometry, LineString, MultiLineString};

use crate::AnalyticsError;

/// Supplies segment centerline geometry.
pub trait SegmentGeometries {
    /// Geometry of `segment`, `None` when the segment has none.
    fn geometry(&self, segment: SegmentId) -> Option<Geometry<f64>>;
}

impl SegmentGeometries for StreetNetwork {
    fn geometry(&self, segment: SegmentId) -> Option<Geometry<f64>> {
        Self::geometry(self, segment).map(|g| Geometry::MultiLineString(g.clone()))
    }
}

impl SegmentGeometries for BTreeMap<SegmentId, Geometry<f64>> {
    fn geometry(&self, segment: SegmentId) -> Option<Geometry<f64>> {
        self.get(&segment).cloned()
    }
}

/// Combines linear geometries.
pub trait GeometryMerger {
    /// Merges two linear geometries into one.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Geometry`] if either input is not linear.
    fn merge(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>, AnalyticsError>;

    /// Converts a linear geometry into a multi-line.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Geometry`] if the input is not linear.
    fn normalize_to_multi(&self, geometry: Geometry<f64>) -> Result<MultiLineString<f64>, AnalyticsError>;
}

/// Default [`GeometryMerger`]: union plus line merge at degree-two nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMerger;

impl GeometryMerger for LineMerger {
    fn merge(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>, AnalyticsError> {
        let mut lines = self.normalize_to_multi(a.clone())?.0;
        lines.extend(self.normalize_to_multi(b.clone())?.0);

        let mut merged = join_at_degree_two(dedupe(lines));
        Ok(if merged.len() == 1 {
            Geometry::LineString(merged.remove(0))
        } else {
            Geometry::MultiLineString(MultiLineString::new(merged))
        })
    }

    fn normalize_to_multi(&self, geometry: Geometry<f64>) -> Result<MultiLineString<f64>, AnalyticsError> {
        let mut lines = Vec::new();
        collect_lines(geometry, &mut lines)?;
        Ok(MultiLineString::new(lines))
    }
}

fn collect_lines(geometry: Geometry<f64>, out: &mut Vec<LineString<f64>>) -> Result<(), AnalyticsError> {
    match geometry {
        Geometry::Line(line) => out.push(LineString::from(vec![line.start, line.end])),
        Geometry::LineString(line) => out.push(line),
        Geometry::MultiLineString(multi) => out.extend(multi.0),
        Geometry::GeometryCollection(collection) => {
            for inner in collection {
                collect_lines(inner, out)?;
            }
        }
        other => {
            return Err(AnalyticsError::Geometry {
                message: format!("Expected linear geometry, got {}", kind(&other)),
            });
        }
    }
    Ok(())
}

const fn kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

type NodeKey = (u64, u64);

fn node_key(coord: Coord<f64>) -> NodeKey {
    // +0.0 folds -0.0 onto 0.0
    ((coord.x + 0.0).to_bits(), (coord.y + 0.0).to_bits())
}

fn ends(line: &LineString<f64>) -> Option<(NodeKey, NodeKey)> {
    Some((node_key(*line.0.first()?), node_key(*line.0.last()?)))
}

/// Drops empty lines and lines identical to an earlier one in either
/// orientation.
fn dedupe(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut seen = BTreeSet::new();
    lines
        .into_iter()
        .filter(|line| line.0.len() >= 2)
        .filter(|line| {
            let forward: Vec<NodeKey> = line.0.iter().copied().map(node_key).collect();
            let mut backward = forward.clone();
            backward.reverse();
            seen.insert(forward.min(backward))
        })
        .collect()
}

fn join_at_degree_two(mut lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut degree: BTreeMap<NodeKey, usize> = BTreeMap::new();
    for (start, end) in lines.iter().filter_map(ends) {
        *degree.entry(start).or_default() += 1;
        *degree.entry(end).or_default() += 1;
    }

    'outer: loop {
        for i in 0..lines.len() {
            for j in (i + 1)..lines.len() {
                if let Some(joined) = try_join(&lines[i], &lines[j], &degree) {
                    lines[i] = joined;
                    lines.remove(j);
                    continue 'outer;
                }
            }
        }
        return lines;
    }
}

fn try_join(
    a: &LineString<f64>,
    b: &LineString<f64>,
    degree: &BTreeMap<NodeKey, usize>,
) -> Option<LineString<f64>> {
    let (a0, a1) = ends(a)?;
    let (b0, b1) = ends(b)?;
    let joinable = |node: NodeKey| degree.get(&node) == Some(&2);

    let reversed = |line: &LineString<f64>| {
        let mut coords = line.0.clone();
        coords.reverse();
        coords
    };

    let (head, tail) = if a1 == b0 && joinable(a1) {
        (a.0.clone(), b.0.clone())
    } else if a1 == b1 && joinable(a1) {
        (a.0.clone(), reversed(b))
    } else if a0 == b1 && joinable(a0) {
        (b.0.clone(), a.0.clone())
    } else if a0 == b0 && joinable(a0) {
        (reversed(b), a.0.clone())
    } else {
        return None;
    };

    let mut coords = head;
    coords.extend(tail.into_iter().skip(1));
    Some(LineString::new(coords))
}

/// Folds the geometries of `segments` in ascending id order.
///
/// Segments without geometry are skipped. Returns `None` when no segment
/// has geometry.
///
/// # Errors
///
/// Returns [`AnalyticsError::Geometry`] if a member geometry is not linear.
pub fn merge_road_geometry(
    segments: &BTreeSet<SegmentId>,
    geometries: &dyn SegmentGeometries,
    merger: &dyn GeometryMerger,
) -> Result<Option<MultiLineString<f64>>, AnalyticsError> {
    let mut merged: Option<Geometry<f64>> = None;

    for segment in segments {
        let Some(geometry) = geometries.geometry(*segment) else {
            continue;
        };
        merged = Some(match merged {
            Some(acc) => merger.merge(&acc, &geometry)?,
            None => geometry,
        });
    }

    merged.map(|g| merger.normalize_to_multi(g)).transpose()
}

#[cfg(test)]
mod tests {
    use geo::{Euclidean, Length, Point};

    use super::*;

    fn ls(coords: &[(f64, f64)]) -> Geometry<f64> {
        Geometry::LineString(LineString::from(coords.to_vec()))
    }

    #[test]
    fn joins_lines_meeting_end_to_end() {
        let merged = LineMerger
            .merge(&ls(&[(0.0, 0.0), (1.0, 0.0)]), &ls(&[(2.0, 0.0), (1.0, 0.0)]))
            .unwrap();
        let Geometry::LineString(line) = merged else {
            panic!("expected a single line, got {merged:?}");
        };
        assert_eq!(line.0.len(), 3);
        assert!((Euclidean.length(&line) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn keeps_disjoint_lines_apart() {
        let merged = LineMerger
            .merge(&ls(&[(0.0, 0.0), (1.0, 0.0)]), &ls(&[(5.0, 0.0), (6.0, 0.0)]))
            .unwrap();
        let multi = LineMerger.normalize_to_multi(merged).unwrap();
        assert_eq!(multi.0.len(), 2);
    }

    #[test]
    fn does_not_join_through_a_branch() {
        let ab = Geometry::MultiLineString(MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
            LineString::from(vec![(1.0, 0.0), (2.0, 0.0)]),
        ]));
        let c = ls(&[(1.0, 0.0), (1.0, 1.0)]);
        let abc = LineMerger.merge(&ab, &c).unwrap();
        let multi = LineMerger.normalize_to_multi(abc).unwrap();
        assert_eq!(multi.0.len(), 3);
    }

    #[test]
    fn duplicate_lines_collapse() {
        let a = ls(&[(0.0, 0.0), (1.0, 0.0)]);
        let reversed = ls(&[(1.0, 0.0), (0.0, 0.0)]);
        let merged = LineMerger.merge(&a, &reversed).unwrap();
        assert!(matches!(merged, Geometry::LineString(_)));
    }

    #[test]
    fn rejects_non_linear_input() {
        let err = LineMerger
            .normalize_to_multi(Geometry::Point(Point::new(0.0, 0.0)))
            .unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn road_geometry_skips_members_without_geometry() {
        let geometries: BTreeMap<SegmentId, Geometry<f64>> = [
            (SegmentId(3), ls(&[(1.0, 0.0), (2.0, 0.0)])),
            (SegmentId(1), ls(&[(0.0, 0.0), (1.0, 0.0)])),
        ]
        .into();
        let members: BTreeSet<_> = [SegmentId(1), SegmentId(2), SegmentId(3)].into();

        let merged = merge_road_geometry(&members, &geometries, &LineMerger)
            .unwrap()
            .unwrap();
        assert_eq!(merged.0.len(), 1);
        assert_eq!(merged.0[0].0.first(), Some(&Coord { x: 0.0, y: 0.0 }));

        let none: BTreeSet<_> = [SegmentId(2)].into();
        assert!(
            merge_road_geometry(&none, &geometries, &LineMerger)
                .unwrap()
                .is_none()
        );
    }
}

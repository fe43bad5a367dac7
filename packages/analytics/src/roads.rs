//! Road building: partitions same-named segments into connected runs and
//! rolls segment statistics up per run.
//!
//! Two segments are adjacent when they share a name, share an endpoint
//! intersection, and (with [`RoadBuilderOptions::split_on_classification`])
//! carry the same classification tag. Roads are the connected components
//! of that relation, found per (name, classification) group with a
//! [`UnionFind`] over intersection ids.
//!
//! A missing name or (when splitting) a missing classification matches
//! nothing, so such a segment is always a road of its own.
//!
//! Road ids are deterministic: groups are visited in (name,
//! classification) order, components within a group by their smallest
//! segment id, and ids count up from 1.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crash_map_analytics_models::{
    CrashContribution, Rates, Road, RoadClassification, RoadId, RoadStats,
};
use crash_map_crash_models::CrashId;
use crash_map_source::progress::ProgressCallback;
use crash_map_street_models::{IntersectionId, Segment, SegmentId, StreetClassification};

use crate::aggregate::SegmentStatsTable;
use crate::geometry::{GeometryMerger, LineMerger, SegmentGeometries, merge_road_geometry};
use crate::union_find::UnionFind;
use crate::AnalyticsError;

/// Options controlling how segments are grouped into roads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadBuilderOptions {
    /// Only join segments that carry the same classification tag.
    pub split_on_classification: bool,
}

impl Default for RoadBuilderOptions {
    fn default() -> Self {
        Self {
            split_on_classification: true,
        }
    }
}

/// Membership of one road, before geometry and statistics are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadMembership {
    /// Shared segment name.
    pub name: String,
    /// Distinct classification tags of the members.
    pub classifications: BTreeSet<StreetClassification>,
    /// Member segments.
    pub segments: BTreeSet<SegmentId>,
    /// Union of member endpoints.
    pub intersections: BTreeSet<IntersectionId>,
}

impl RoadMembership {
    fn smallest_segment(&self) -> Option<SegmentId> {
        self.segments.first().copied()
    }
}

/// (name, classification when splitting, segment id when the segment
/// cannot join anything).
type GroupKey = (String, Option<StreetClassification>, Option<SegmentId>);

/// Partitions segments into roads and computes per-road statistics.
pub struct RoadBuilder {
    options: RoadBuilderOptions,
    merger: Box<dyn GeometryMerger>,
}

impl RoadBuilder {
    /// Creates a builder that merges geometry with [`LineMerger`].
    #[must_use]
    pub fn new(options: RoadBuilderOptions) -> Self {
        Self {
            options,
            merger: Box::new(LineMerger),
        }
    }

    /// Replaces the geometry merger.
    #[must_use]
    pub fn with_merger(mut self, merger: Box<dyn GeometryMerger>) -> Self {
        self.merger = merger;
        self
    }

    /// Partitions `segments` into road memberships, in road id order.
    ///
    /// Every segment lands in exactly one membership.
    pub fn build<'s>(&self, segments: impl IntoIterator<Item = &'s Segment>) -> Vec<RoadMembership> {
        let mut groups: BTreeMap<GroupKey, Vec<&Segment>> = BTreeMap::new();
        for segment in segments {
            let split = self.options.split_on_classification;
            let class = split.then_some(segment.classification);
            let isolated = !segment.is_named()
                || (split && segment.classification == StreetClassification::Unknown);
            groups
                .entry((segment.name.clone(), class, isolated.then_some(segment.id)))
                .or_default()
                .push(segment);
        }

        let mut memberships = Vec::new();
        for ((name, _, _), members) in groups {
            let mut components = connected_components(&name, &members);
            components.sort_by_key(RoadMembership::smallest_segment);
            memberships.extend(components);
        }

        memberships
    }

    /// Builds roads with merged geometry and rolled-up statistics.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Geometry`] if a member geometry cannot be
    /// merged.
    pub fn build_roads<'s>(
        &self,
        segments: impl IntoIterator<Item = &'s Segment>,
        stats: &SegmentStatsTable,
        geometries: &dyn SegmentGeometries,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<Vec<Road>, AnalyticsError> {
        let segments: Vec<&Segment> = segments.into_iter().collect();
        let lengths: BTreeMap<SegmentId, Option<f64>> = segments
            .iter()
            .map(|s| (s.id, s.length_miles))
            .collect();

        let memberships = self.build(segments.iter().copied());
        log::info!(
            "Partitioned {} segments into {} roads",
            segments.len(),
            memberships.len()
        );

        progress.set_total(memberships.len() as u64);
        progress.set_message("Building roads".to_string());

        let mut roads = Vec::with_capacity(memberships.len());
        for (index, membership) in memberships.into_iter().enumerate() {
            let id = RoadId(index as u64 + 1);
            let geometry = merge_road_geometry(&membership.segments, geometries, self.merger.as_ref())
                .map_err(|e| AnalyticsError::Geometry {
                    message: format!("road {id} ({}): {e}", membership.name),
                })?;
            let road_stats = roll_up(&membership.segments, stats, &lengths);
            let classification = RoadClassification::resolve(&membership.classifications);

            if classification == RoadClassification::Mixed {
                log::debug!(
                    "Road {id} ({}) mixes classifications {:?}",
                    membership.name,
                    membership.classifications
                );
            }

            roads.push(Road {
                id,
                name: membership.name,
                classification,
                classifications: membership.classifications,
                segments: membership.segments,
                intersections: membership.intersections,
                geometry,
                stats: road_stats,
            });
            progress.inc(1);
        }

        progress.finish(format!("Built {} roads", roads.len()));
        Ok(roads)
    }
}

fn connected_components(name: &str, members: &[&Segment]) -> Vec<RoadMembership> {
    let mut uf = UnionFind::new(members.iter().flat_map(|s| s.endpoints()));
    for segment in members {
        uf.union(segment.from, segment.to);
    }

    let mut components: BTreeMap<usize, RoadMembership> = BTreeMap::new();
    for segment in members {
        let Some(root) = uf.find(segment.from) else {
            continue;
        };
        let component = components.entry(root).or_insert_with(|| RoadMembership {
            name: name.to_string(),
            classifications: BTreeSet::new(),
            segments: BTreeSet::new(),
            intersections: BTreeSet::new(),
        });
        component.classifications.insert(segment.classification);
        component.segments.insert(segment.id);
        component.intersections.extend(segment.endpoints());
    }

    components.into_values().collect()
}

/// Statistics over the union of the members' contributing crashes.
fn roll_up(
    segments: &BTreeSet<SegmentId>,
    stats: &SegmentStatsTable,
    lengths: &BTreeMap<SegmentId, Option<f64>>,
) -> RoadStats {
    let mut crashes: BTreeMap<CrashId, CrashContribution> = BTreeMap::new();
    let mut length: Option<f64> = None;

    for segment in segments {
        let known = stats
            .get(*segment)
            .and_then(|s| s.length_miles)
            .or_else(|| lengths.get(segment).copied().flatten())
            .filter(|l| l.is_finite() && *l > 0.0);
        if let Some(l) = known {
            length = Some(length.unwrap_or(0.0) + l);
        }
        if let Some(s) = stats.get(*segment) {
            crashes.extend(s.crashes.iter().map(|(id, c)| (*id, *c)));
        }
    }

    let ksi = crashes.values().map(|c| u64::from(c.ksi)).sum();
    let injured = crashes.values().map(|c| u64::from(c.injured)).sum();
    let count = crashes.len() as u64;

    RoadStats {
        ksi,
        injured,
        crashes: count,
        length_miles: length,
        rates: Rates::compute(ksi, injured, count, length),
    }
}

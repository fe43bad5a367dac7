//! Per-segment crash aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use crash_map_analytics_models::{CrashContribution, SegmentCrashRow, SegmentStats, SegmentStatsRow};
use crash_map_crash_models::{CrashId, NormalizedCrash};
use crash_map_geocoder::SegmentGeocoder;
use crash_map_source::progress::ProgressCallback;
use crash_map_source::streets::StreetNetwork;
use crash_map_street_models::SegmentId;

/// Supplies segment lengths in miles.
pub trait SegmentLengths {
    /// Length of `segment`, `None` when unknown or zero.
    fn length_miles(&self, segment: SegmentId) -> Option<f64>;
}

impl SegmentLengths for StreetNetwork {
    fn length_miles(&self, segment: SegmentId) -> Option<f64> {
        Self::length_miles(self, segment)
    }
}

impl SegmentLengths for BTreeMap<SegmentId, f64> {
    fn length_miles(&self, segment: SegmentId) -> Option<f64> {
        self.get(&segment).copied().filter(|l| l.is_finite() && *l > 0.0)
    }
}

/// Folds (crash, segment) pairs into [`SegmentStats`].
pub struct SegmentAggregator<'a> {
    lengths: &'a dyn SegmentLengths,
    stats: BTreeMap<SegmentId, SegmentStats>,
    recorded_pairs: u64,
}

impl<'a> SegmentAggregator<'a> {
    /// Creates an aggregator that looks up segment lengths in `lengths`.
    #[must_use]
    pub fn new(lengths: &'a dyn SegmentLengths) -> Self {
        Self {
            lengths,
            stats: BTreeMap::new(),
            recorded_pairs: 0,
        }
    }

    /// Records `crash` against each of `segments`.
    ///
    /// Pairs already recorded are ignored, so feeding the same crash twice
    /// leaves the totals unchanged.
    pub fn record(&mut self, crash: &NormalizedCrash, segments: &[SegmentId]) {
        let contribution = CrashContribution::from(crash);
        for segment in segments {
            let stats = self.stats.entry(*segment).or_insert_with(|| {
                SegmentStats::new(*segment, self.lengths.length_miles(*segment))
            });
            if stats.record(crash.id, contribution) {
                self.recorded_pairs += 1;
            }
        }
    }

    /// Freezes the accumulated statistics.
    #[must_use]
    pub fn finish(self) -> SegmentStatsTable {
        log::debug!(
            "Aggregated {} crash/segment pairs over {} segments",
            self.recorded_pairs,
            self.stats.len()
        );
        SegmentStatsTable { stats: self.stats }
    }
}

/// Frozen per-segment statistics, ordered by segment id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentStatsTable {
    stats: BTreeMap<SegmentId, SegmentStats>,
}

impl SegmentStatsTable {
    /// Statistics for `segment`, if any crash touched it.
    #[must_use]
    pub fn get(&self, segment: SegmentId) -> Option<&SegmentStats> {
        self.stats.get(&segment)
    }

    /// All segment statistics in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SegmentStats> {
        self.stats.values()
    }

    /// Number of segments with at least one crash.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether no segment has a crash.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Per-segment statistics table.
    #[must_use]
    pub fn rows(&self) -> Vec<SegmentStatsRow> {
        self.stats.values().map(SegmentStats::row).collect()
    }

    /// The segment/crash relation, ordered by segment then crash id.
    #[must_use]
    pub fn crash_pairs(&self) -> Vec<SegmentCrashRow> {
        self.stats
            .values()
            .flat_map(|s| {
                s.crashes.keys().map(|crash_id| SegmentCrashRow {
                    segment_id: s.segment_id,
                    crash_id: *crash_id,
                })
            })
            .collect()
    }
}

/// Geocodes every crash and aggregates it onto the segments it touches.
#[must_use]
pub fn aggregate_crashes(
    crashes: &BTreeMap<CrashId, NormalizedCrash>,
    geocoder: &dyn SegmentGeocoder,
    lengths: &dyn SegmentLengths,
    progress: &Arc<dyn ProgressCallback>,
) -> SegmentStatsTable {
    progress.set_total(crashes.len() as u64);
    progress.set_message("Aggregating crashes onto segments".to_string());

    let mut aggregator = SegmentAggregator::new(lengths);
    let mut unresolved = 0u64;

    for crash in crashes.values() {
        let segments = geocoder.segments_for(crash);
        if segments.is_empty() {
            unresolved += 1;
            log::trace!("Crash {} touches no segment", crash.id);
        }
        aggregator.record(crash, &segments);
        progress.inc(1);
    }

    let table = aggregator.finish();
    log::info!(
        "Aggregated {} crashes onto {} segments ({unresolved} unresolved)",
        crashes.len() as u64 - unresolved,
        table.len()
    );
    progress.finish(format!("Aggregated onto {} segments", table.len()));

    table
}

#[cfg(test)]
mod tests {
    use crash_map_crash_models::InjuryCounts;
    use crash_map_source::progress::null_progress;

    use super::*;

    fn crash(id: u64, fatal: u32, minor: u32) -> NormalizedCrash {
        NormalizedCrash {
            id: CrashId(id),
            intersection_number: Some(id),
            direction: None,
            distance_ft: None,
            date: None,
            injuries: InjuryCounts {
                fatal,
                major: 0,
                moderate: 0,
                minor,
            },
        }
    }

    fn lengths() -> BTreeMap<SegmentId, f64> {
        [(SegmentId(1), 0.5), (SegmentId(2), 0.0)].into()
    }

    /// Maps crash id `n` to the segments listed for it.
    struct FixedGeocoder(BTreeMap<u64, Vec<SegmentId>>);

    impl SegmentGeocoder for FixedGeocoder {
        fn segments_for(&self, crash: &NormalizedCrash) -> Vec<SegmentId> {
            self.0.get(&crash.id.0).cloned().unwrap_or_default()
        }

        fn locate(&self, _crash: &NormalizedCrash) -> Option<crash_map_geocoder::CrashLocation> {
            None
        }
    }

    #[test]
    fn repeated_pairs_are_idempotent() {
        let lengths = lengths();
        let mut aggregator = SegmentAggregator::new(&lengths);
        let c = crash(1, 1, 1);
        aggregator.record(&c, &[SegmentId(1)]);
        aggregator.record(&c, &[SegmentId(1), SegmentId(1)]);
        let table = aggregator.finish();

        let stats = table.get(SegmentId(1)).unwrap();
        assert_eq!(stats.total_crashes, 1);
        assert_eq!(stats.ksi, 1);
        assert_eq!(stats.injured, 2);
    }

    #[test]
    fn crash_counts_once_per_touched_segment() {
        let lengths = lengths();
        let mut aggregator = SegmentAggregator::new(&lengths);
        aggregator.record(&crash(1, 0, 2), &[SegmentId(1), SegmentId(2)]);
        aggregator.record(&crash(2, 0, 0), &[]);
        let table = aggregator.finish();

        assert_eq!(table.len(), 2);
        let total: u64 = table.iter().map(|s| s.injured).sum();
        assert_eq!(total, 4);
        assert_eq!(
            table.crash_pairs(),
            vec![
                SegmentCrashRow {
                    segment_id: SegmentId(1),
                    crash_id: CrashId(1)
                },
                SegmentCrashRow {
                    segment_id: SegmentId(2),
                    crash_id: CrashId(1)
                },
            ]
        );
    }

    #[test]
    fn zero_or_missing_length_yields_no_rates() {
        let lengths = lengths();
        let mut aggregator = SegmentAggregator::new(&lengths);
        aggregator.record(&crash(1, 1, 0), &[SegmentId(2), SegmentId(3)]);
        let table = aggregator.finish();

        for id in [SegmentId(2), SegmentId(3)] {
            let stats = table.get(id).unwrap();
            assert!(stats.length_miles.is_none());
            assert!(stats.rates().ksi_per_mile.is_none());
        }
    }

    #[test]
    fn aggregate_skips_unresolved_crashes() {
        let mut crashes = BTreeMap::new();
        for c in [crash(1, 1, 0), crash(2, 0, 1), crash(3, 0, 1)] {
            crashes.insert(c.id, c);
        }
        let geocoder = FixedGeocoder(
            [
                (1, vec![SegmentId(1)]),
                (2, vec![SegmentId(1)]),
            ]
            .into(),
        );

        let table = aggregate_crashes(&crashes, &geocoder, &lengths(), &null_progress());

        assert_eq!(table.rows(), vec![SegmentStatsRow {
            segment_id: SegmentId(1),
            total_crashes: 2,
            total_injured: 2,
            total_ksi: 1,
        }]);
        let rates = table.get(SegmentId(1)).unwrap().rates();
        assert!((rates.crashes_per_mile.unwrap() - 4.0).abs() < f64::EPSILON);
    }
}

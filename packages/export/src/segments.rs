//! Per-segment outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crash_map_analytics::aggregate::SegmentStatsTable;
use crash_map_analytics_models::{Rates, SegmentStats};
use crash_map_street_models::SegmentId;
use serde::Serialize;

use crate::{
    ExportError, STREET_DATA_CSV, STREET_DATA_JSON, STREET_TO_CRASH_CSV, write_csv, write_json,
};

#[derive(Serialize)]
struct SegmentJson<'a> {
    #[serde(flatten)]
    stats: &'a SegmentStats,
    #[serde(flatten)]
    rates: Rates,
}

/// Writes `street_data.csv`, `street_to_crash.csv` and `street_data.json`.
///
/// # Errors
///
/// Returns [`ExportError`] if any file cannot be written.
pub fn write_segment_outputs(
    dir: &Path,
    table: &SegmentStatsTable,
) -> Result<Vec<PathBuf>, ExportError> {
    let json: BTreeMap<SegmentId, SegmentJson<'_>> = table
        .iter()
        .map(|stats| {
            (
                stats.segment_id,
                SegmentJson {
                    stats,
                    rates: stats.rates(),
                },
            )
        })
        .collect();

    Ok(vec![
        write_csv(dir, STREET_DATA_CSV, table.rows())?,
        write_csv(dir, STREET_TO_CRASH_CSV, table.crash_pairs())?,
        write_json(dir, STREET_DATA_JSON, &json)?,
    ])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crash_map_analytics::aggregate::SegmentAggregator;
    use crash_map_crash_models::{CrashId, InjuryCounts, NormalizedCrash};

    use super::*;
    use crate::test_utils::scratch_dir;

    fn table() -> SegmentStatsTable {
        let lengths: BTreeMap<SegmentId, f64> = [(SegmentId(4), 0.5)].into();
        let mut aggregator = SegmentAggregator::new(&lengths);
        for (id, segments) in [(11, vec![SegmentId(4)]), (12, vec![SegmentId(4), SegmentId(9)])] {
            let crash = NormalizedCrash {
                id: CrashId(id),
                intersection_number: None,
                direction: None,
                distance_ft: None,
                date: None,
                injuries: InjuryCounts {
                    fatal: 0,
                    major: 1,
                    moderate: 0,
                    minor: 1,
                },
            };
            aggregator.record(&crash, &segments);
        }
        aggregator.finish()
    }

    #[test]
    fn writes_segment_tables() {
        let dir = scratch_dir("segments");
        write_segment_outputs(&dir, &table()).unwrap();

        let csv = std::fs::read_to_string(dir.join(STREET_DATA_CSV)).unwrap();
        assert_eq!(csv, "id,total_crashes,injured,ksi\n4,2,4,2\n9,1,2,1\n");

        let pairs = std::fs::read_to_string(dir.join(STREET_TO_CRASH_CSV)).unwrap();
        assert_eq!(pairs, "street_id,crash_id\n4,11\n4,12\n9,12\n");
    }

    #[test]
    fn json_carries_rates_and_crashes() {
        let dir = scratch_dir("segments_json");
        write_segment_outputs(&dir, &table()).unwrap();

        let text = std::fs::read_to_string(dir.join(STREET_DATA_JSON)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["4"]["crashes/mile"], serde_json::json!(4.0));
        assert_eq!(json["4"]["crashes"]["12"]["ksi"], serde_json::json!(1));
        assert!(json["9"]["ksi/mile"].is_null());
        assert!(json["9"]["length_miles"].is_null());
    }
}

//! Per-road outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crash_map_analytics_models::{Road, RoadClassification, RoadId, RoadStats};
use crash_map_street_models::{IntersectionId, SegmentId, StreetClassification};
use geo::MultiLineString;
use serde::Serialize;

use crate::{ExportError, ROADS_CSV, ROADS_JSON, write_csv, write_json};

/// One row of `roads.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadCsvRow {
    /// Road id.
    pub roadid: RoadId,
    /// Merged geometry as `GeoJSON` text, empty when the road has none.
    pub geom: String,
    /// Road name.
    pub name: String,
    /// Resolved classification (`Mixed` when members disagree).
    pub street_classification: RoadClassification,
    /// Whether any member is a collector, major, minor or expressway.
    pub relevant_road: bool,
    /// KSI total.
    pub ksi: u64,
    /// Injured total.
    pub injured: u64,
    /// Distinct crash count.
    pub crashes: u64,
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

impl RoadCsvRow {
    /// Flattens a road into a table row.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if the geometry cannot be encoded.
    pub fn from_road(road: &Road) -> Result<Self, ExportError> {
        let geom = match &road.geometry {
            Some(geometry) => geometry_text(geometry)?,
            None => String::new(),
        };
        Ok(Self {
            roadid: road.id,
            geom,
            name: road.name.clone(),
            street_classification: road.classification,
            relevant_road: road.is_relevant(),
            ksi: road.stats.ksi,
            injured: road.stats.injured,
            crashes: road.stats.crashes,
            ksi_per_mile: road.stats.rates.ksi_per_mile,
            injured_per_mile: road.stats.rates.injured_per_mile,
            crashes_per_mile: road.stats.rates.crashes_per_mile,
        })
    }
}

/// Encodes a multi-line as a `GeoJSON` geometry object.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn geometry_text(geometry: &MultiLineString<f64>) -> Result<String, ExportError> {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    Ok(serde_json::to_string(&geometry)?)
}

#[derive(Serialize)]
struct RoadJson<'a> {
    name: &'a str,
    classification: RoadClassification,
    street_classification: &'a BTreeSet<StreetClassification>,
    relevant_road: bool,
    segments: &'a BTreeSet<SegmentId>,
    intersections: &'a BTreeSet<IntersectionId>,
    #[serde(flatten)]
    stats: &'a RoadStats,
}

/// Writes `roads.json` and `roads.csv`.
///
/// # Errors
///
/// Returns [`ExportError`] if a geometry cannot be encoded or a file cannot
/// be written.
pub fn write_road_outputs(dir: &Path, roads: &[Road]) -> Result<Vec<PathBuf>, ExportError> {
    let rows = roads
        .iter()
        .map(RoadCsvRow::from_road)
        .collect::<Result<Vec<_>, _>>()?;

    let json: BTreeMap<RoadId, RoadJson<'_>> = roads
        .iter()
        .map(|road| {
            (
                road.id,
                RoadJson {
                    name: &road.name,
                    classification: road.classification,
                    street_classification: &road.classifications,
                    relevant_road: road.is_relevant(),
                    segments: &road.segments,
                    intersections: &road.intersections,
                    stats: &road.stats,
                },
            )
        })
        .collect();

    Ok(vec![
        write_json(dir, ROADS_JSON, &json)?,
        write_csv(dir, ROADS_CSV, rows)?,
    ])
}

#[cfg(test)]
mod tests {
    use crash_map_analytics_models::Rates;
    use geo::LineString;

    use super::*;
    use crate::test_utils::scratch_dir;

    fn road(id: u64, geometry: Option<MultiLineString<f64>>, length: Option<f64>) -> Road {
        let classifications: BTreeSet<_> = [StreetClassification::Major].into();
        Road {
            id: RoadId(id),
            name: "Main St, North".to_string(),
            classification: RoadClassification::resolve(&classifications),
            classifications,
            segments: [SegmentId(1), SegmentId(2)].into(),
            intersections: [IntersectionId(1), IntersectionId(2), IntersectionId(3)].into(),
            geometry,
            stats: RoadStats {
                ksi: 1,
                injured: 2,
                crashes: 1,
                length_miles: length,
                rates: Rates::compute(1, 2, 1, length),
            },
        }
    }

    #[test]
    fn csv_rows_quote_names_and_blank_missing_rates() {
        let dir = scratch_dir("roads");
        let line = MultiLineString::new(vec![LineString::from(vec![(0.0, 0.0), (1.0, 0.0)])]);
        write_road_outputs(&dir, &[road(1, Some(line), Some(2.0)), road(2, None, None)]).unwrap();

        let mut reader = csv::Reader::from_path(dir.join(ROADS_CSV)).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![
                "roadid",
                "geom",
                "name",
                "street_classification",
                "relevant_road",
                "ksi",
                "injured",
                "crashes",
                "ksi/mile",
                "injured/mile",
                "crashes/mile",
            ]
        );

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][2], "Main St, North");
        assert_eq!(&records[0][3], "MA");
        assert_eq!(&records[0][4], "true");
        assert_eq!(&records[0][8], "0.5");

        let geom: serde_json::Value = serde_json::from_str(&records[0][1]).unwrap();
        assert_eq!(geom["type"], "MultiLineString");

        assert_eq!(&records[1][1], "");
        assert_eq!(&records[1][8], "");
    }

    #[test]
    fn json_lists_members() {
        let dir = scratch_dir("roads_json");
        write_road_outputs(&dir, &[road(1, None, Some(2.0))]).unwrap();

        let text = std::fs::read_to_string(dir.join(ROADS_JSON)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["1"]["segments"], serde_json::json!([1, 2]));
        assert_eq!(json["1"]["street_classification"], serde_json::json!(["MA"]));
        assert_eq!(json["1"]["classification"], "MA");
        assert_eq!(json["1"]["ksi/mile"], serde_json::json!(0.5));
    }
}

//! Crash location outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crash_map_crash_models::{CrashId, Direction, NormalizedCrash};
use crash_map_geocoder::CrashLocation;
use crash_map_street_models::IntersectionId;
use serde::Serialize;

use crate::{
    CRASH_LOCATIONS_CSV, CRASH_LOCATIONS_JSON, ExportError, INJURED_CSV, KSI_CSV, write_csv,
    write_json,
};

/// One row of `crash_locations.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrashLocationRow {
    /// Crash id.
    pub crash_id: CrashId,
    /// Internal id of the resolved intersection.
    pub intersection_id: Option<IntersectionId>,
    /// Intersection number as reported.
    pub int_num: Option<u64>,
    /// Normalized direction.
    pub direction: Option<Direction>,
    /// Distance from the intersection in feet.
    pub distance: Option<u32>,
    /// Northing of the crash point.
    pub latitude: Option<f64>,
    /// Easting of the crash point.
    pub longitude: Option<f64>,
}

impl CrashLocationRow {
    /// Builds the row for `crash` and its resolved location, if any.
    #[must_use]
    pub fn new(crash: &NormalizedCrash, location: Option<&CrashLocation>) -> Self {
        Self {
            crash_id: crash.id,
            intersection_id: location.map(|l| l.intersection),
            int_num: crash.intersection_number,
            direction: crash.direction,
            distance: crash.distance_ft,
            latitude: location.map(|l| l.point.y()),
            longitude: location.map(|l| l.point.x()),
        }
    }
}

#[derive(Serialize)]
struct CrashLocationJson {
    #[serde(flatten)]
    row: CrashLocationRow,
    ksi: u32,
    injured: u32,
}

/// One row of `ksi.csv` / `injured.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PersonPointRow {
    /// Sequential id, starting at 1.
    pub id: u64,
    /// Northing of the crash point.
    pub latitude: Option<f64>,
    /// Easting of the crash point.
    pub longitude: Option<f64>,
}

/// Repeats each crash's point once per person counted by `count`.
#[must_use]
pub fn person_points(rows: &[(CrashLocationRow, u32)]) -> Vec<PersonPointRow> {
    let mut points = Vec::new();
    for (row, count) in rows {
        for _ in 0..*count {
            points.push(PersonPointRow {
                id: points.len() as u64 + 1,
                latitude: row.latitude,
                longitude: row.longitude,
            });
        }
    }
    points
}

/// Writes `crash_locations.json`, `crash_locations.csv`, `ksi.csv` and
/// `injured.csv`.
///
/// Crashes missing from `locations` (or located as `None`) are written
/// with blank coordinates.
///
/// # Errors
///
/// Returns [`ExportError`] if any file cannot be written.
pub fn write_crash_outputs(
    dir: &Path,
    crashes: &BTreeMap<CrashId, NormalizedCrash>,
    locations: &BTreeMap<CrashId, Option<CrashLocation>>,
) -> Result<Vec<PathBuf>, ExportError> {
    let rows: Vec<(&NormalizedCrash, CrashLocationRow)> = crashes
        .values()
        .map(|crash| {
            let location = locations.get(&crash.id).and_then(Option::as_ref);
            (crash, CrashLocationRow::new(crash, location))
        })
        .collect();

    let json: BTreeMap<CrashId, CrashLocationJson> = rows
        .iter()
        .map(|(crash, row)| {
            (
                crash.id,
                CrashLocationJson {
                    row: *row,
                    ksi: crash.ksi(),
                    injured: crash.injured(),
                },
            )
        })
        .collect();

    let ksi: Vec<_> = rows.iter().map(|(c, row)| (*row, c.ksi())).collect();
    let injured: Vec<_> = rows.iter().map(|(c, row)| (*row, c.injured())).collect();

    Ok(vec![
        write_json(dir, CRASH_LOCATIONS_JSON, &json)?,
        write_csv(dir, CRASH_LOCATIONS_CSV, rows.iter().map(|(_, row)| row))?,
        write_csv(dir, KSI_CSV, person_points(&ksi))?,
        write_csv(dir, INJURED_CSV, person_points(&injured))?,
    ])
}

#[cfg(test)]
mod tests {
    use crash_map_crash_models::InjuryCounts;
    use geo::Point;

    use super::*;
    use crate::test_utils::scratch_dir;

    fn crash(id: u64, fatal: u32, minor: u32) -> NormalizedCrash {
        NormalizedCrash {
            id: CrashId(id),
            intersection_number: Some(500 + id),
            direction: Some(Direction::North),
            distance_ft: Some(40),
            date: None,
            injuries: InjuryCounts {
                fatal,
                major: 0,
                moderate: 0,
                minor,
            },
        }
    }

    fn inputs() -> (
        BTreeMap<CrashId, NormalizedCrash>,
        BTreeMap<CrashId, Option<CrashLocation>>,
    ) {
        let crashes = [crash(1, 1, 1), crash(2, 0, 1)]
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let locations = [
            (
                CrashId(1),
                Some(CrashLocation {
                    intersection: IntersectionId(77),
                    point: Point::new(100.0, 250.0),
                }),
            ),
            (CrashId(2), None),
        ]
        .into();
        (crashes, locations)
    }

    #[test]
    fn writes_location_table_with_blank_unlocated_rows() {
        let dir = scratch_dir("crashes");
        let (crashes, locations) = inputs();
        write_crash_outputs(&dir, &crashes, &locations).unwrap();

        let csv = std::fs::read_to_string(dir.join(CRASH_LOCATIONS_CSV)).unwrap();
        assert_eq!(
            csv,
            "crash_id,intersection_id,int_num,direction,distance,latitude,longitude\n\
             1,77,501,North,40,250.0,100.0\n\
             2,,502,North,40,,\n"
        );
    }

    #[test]
    fn person_points_repeat_per_person() {
        let dir = scratch_dir("persons");
        let (crashes, locations) = inputs();
        write_crash_outputs(&dir, &crashes, &locations).unwrap();

        let ksi = std::fs::read_to_string(dir.join(KSI_CSV)).unwrap();
        assert_eq!(ksi, "id,latitude,longitude\n1,250.0,100.0\n");

        let injured = std::fs::read_to_string(dir.join(INJURED_CSV)).unwrap();
        assert_eq!(
            injured,
            "id,latitude,longitude\n1,250.0,100.0\n2,250.0,100.0\n3,,\n"
        );
    }

    #[test]
    fn json_includes_severity() {
        let dir = scratch_dir("crashes_json");
        let (crashes, locations) = inputs();
        write_crash_outputs(&dir, &crashes, &locations).unwrap();

        let text = std::fs::read_to_string(dir.join(CRASH_LOCATIONS_JSON)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["1"]["ksi"], 1);
        assert_eq!(json["1"]["injured"], 2);
        assert_eq!(json["2"]["latitude"], serde_json::Value::Null);
    }
}

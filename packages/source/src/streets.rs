//! Street network loading from `GeoJSON` layers.
//!
//! The network is built from two `FeatureCollection`s exported from the
//! city's GIS:
//!
//! | Layer | Geometry | Properties |
//! |-------|----------|------------|
//! | centerlines | `LineString` / `MultiLineString` (feet) | `id`, `fullname`, `frominteri`, `tointerid`, `streetclas`, `munileft`, `muniright` |
//! | intersections | `Point` (feet) | `id`, `intnum` |
//!
//! Crash records reference intersections by `intnum`; segments reference
//! them by `id`.

use std::collections::BTreeMap;
use std::path::Path;

use crash_map_street_models::{
    IntersectionId, Segment, SegmentId, StreetClassification, feet_to_miles,
};
use geo::{Euclidean, Length, MultiLineString, Point};
use geojson::{Feature, GeoJson};

use crate::SourceError;

/// An intersection node of the street network.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// Internal id referenced by segment endpoints.
    pub id: IntersectionId,
    /// Public intersection number referenced by crash records.
    pub number: u64,
    /// Location in projected feet.
    pub location: Point<f64>,
}

/// In-memory street network: segments, their geometries, and intersections.
#[derive(Debug, Default)]
pub struct StreetNetwork {
    segments: BTreeMap<SegmentId, Segment>,
    geometries: BTreeMap<SegmentId, MultiLineString<f64>>,
    intersections: BTreeMap<IntersectionId, Intersection>,
    by_number: BTreeMap<u64, IntersectionId>,
    incident: BTreeMap<IntersectionId, Vec<SegmentId>>,
}

impl StreetNetwork {
    /// Builds a network from already-parsed parts.
    ///
    /// Segment lengths are taken as given; geometries are optional per
    /// segment.
    #[must_use]
    pub fn from_parts(
        segments: Vec<(Segment, Option<MultiLineString<f64>>)>,
        intersections: Vec<Intersection>,
    ) -> Self {
        let mut network = Self::default();

        for intersection in intersections {
            network
                .by_number
                .insert(intersection.number, intersection.id);
            network.intersections.insert(intersection.id, intersection);
        }

        for (segment, geometry) in segments {
            for endpoint in segment.endpoints() {
                let incident = network.incident.entry(endpoint).or_default();
                if !incident.contains(&segment.id) {
                    incident.push(segment.id);
                }
            }
            if let Some(geometry) = geometry {
                network.geometries.insert(segment.id, geometry);
            }
            network.segments.insert(segment.id, segment);
        }

        network
    }

    /// Loads the centerline and intersection layers from disk.
    ///
    /// When `municipality` is set, only segments whose left or right
    /// municipality code matches it (case-insensitively) are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if either file cannot be read or parsed, or
    /// a feature is missing a required property.
    pub fn load(
        centerlines_path: &Path,
        intersections_path: &Path,
        municipality: Option<&str>,
    ) -> Result<Self, SourceError> {
        log::info!("Loading centerlines from {}", centerlines_path.display());
        let centerlines = read_features(centerlines_path)?;

        let mut segments = Vec::with_capacity(centerlines.len());
        let mut skipped = 0usize;
        for feature in &centerlines {
            if let Some(muni) = municipality
                && !in_municipality(feature, muni)
            {
                skipped += 1;
                continue;
            }
            segments.push(parse_centerline(feature)?);
        }
        log::info!(
            "Loaded {} segments ({skipped} outside municipality filter)",
            segments.len()
        );

        log::info!(
            "Loading intersections from {}",
            intersections_path.display()
        );
        let intersections = read_features(intersections_path)?
            .iter()
            .map(parse_intersection)
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Loaded {} intersections", intersections.len());

        Ok(Self::from_parts(segments, intersections))
    }

    /// All segments in ascending id order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Looks up a segment by id.
    #[must_use]
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    /// Centerline geometry of a segment, if it has one.
    #[must_use]
    pub fn geometry(&self, id: SegmentId) -> Option<&MultiLineString<f64>> {
        self.geometries.get(&id)
    }

    /// Looks up an intersection by its internal id.
    #[must_use]
    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(&id)
    }

    /// Looks up an intersection by the public number used in crash records.
    #[must_use]
    pub fn intersection_by_number(&self, number: u64) -> Option<&Intersection> {
        self.by_number
            .get(&number)
            .and_then(|id| self.intersections.get(id))
    }

    /// Segments having `intersection` as an endpoint.
    #[must_use]
    pub fn segments_at(&self, intersection: IntersectionId) -> &[SegmentId] {
        self.incident
            .get(&intersection)
            .map_or(&[], Vec::as_slice)
    }

    /// Length of a segment in miles, `None` if unknown or zero.
    #[must_use]
    pub fn length_miles(&self, id: SegmentId) -> Option<f64> {
        self.segments.get(&id).and_then(|s| s.length_miles)
    }
}

fn read_features(path: &Path) -> Result<Vec<Feature>, SourceError> {
    let text = std::fs::read_to_string(path)?;
    let geojson: GeoJson = text.parse()?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        _ => Err(SourceError::schema(format!(
            "{}: expected a FeatureCollection",
            path.display()
        ))),
    }
}

fn in_municipality(feature: &Feature, muni: &str) -> bool {
    ["munileft", "muniright"].iter().any(|key| {
        property_str(feature, key).is_some_and(|value| value.eq_ignore_ascii_case(muni))
    })
}

/// Parses one centerline feature into a segment and its geometry.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if `id`, `frominteri`, or `tointerid` is
/// missing, or the geometry is not linear.
pub fn parse_centerline(
    feature: &Feature,
) -> Result<(Segment, Option<MultiLineString<f64>>), SourceError> {
    let id = required_u64(feature, "id").map(SegmentId)?;
    let from = required_u64(feature, "frominteri").map(IntersectionId)?;
    let to = required_u64(feature, "tointerid").map(IntersectionId)?;

    let geometry = match &feature.geometry {
        Some(geometry) => {
            let geometry: geo::Geometry<f64> = geometry.clone().try_into()?;
            match geometry {
                geo::Geometry::LineString(ls) => Some(MultiLineString::new(vec![ls])),
                geo::Geometry::MultiLineString(mls) => Some(mls),
                other => {
                    return Err(SourceError::schema(format!(
                        "segment {id}: expected linear geometry, found {other:?}"
                    )));
                }
            }
        }
        None => None,
    };

    let length_feet = geometry.as_ref().map(|g| Euclidean.length(g));

    let segment = Segment {
        id,
        name: property_str(feature, "fullname")
            .unwrap_or_default()
            .trim()
            .to_string(),
        from,
        to,
        classification: StreetClassification::from_code(property_str(feature, "streetclas")),
        length_miles: feet_to_miles(length_feet),
    };

    Ok((segment, geometry))
}

/// Parses one intersection point feature.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if `id` or `intnum` is missing or the
/// geometry is not a point.
pub fn parse_intersection(feature: &Feature) -> Result<Intersection, SourceError> {
    let id = required_u64(feature, "id").map(IntersectionId)?;
    let number = required_u64(feature, "intnum")?;

    let Some(geometry) = &feature.geometry else {
        return Err(SourceError::schema(format!(
            "intersection {id}: missing geometry"
        )));
    };
    let geo::Geometry::Point(location) = geo::Geometry::<f64>::try_from(geometry.clone())? else {
        return Err(SourceError::schema(format!(
            "intersection {id}: expected point geometry"
        )));
    };

    Ok(Intersection {
        id,
        number,
        location,
    })
}

fn property_str<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    feature.property(key).and_then(serde_json::Value::as_str)
}

fn property_u64(feature: &Feature, key: &str) -> Option<u64> {
    match feature.property(key)? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let v = f as u64;
                    v
                })
        }),
        serde_json::Value::String(s) => crate::parsing::parse_id(s),
        _ => None,
    }
}

fn required_u64(feature: &Feature, key: &str) -> Result<u64, SourceError> {
    property_u64(feature, key).ok_or_else(|| {
        SourceError::schema(format!(
            "feature {:?} missing numeric property {key:?}",
            feature.property("id")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTERLINES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 2640.0]] },
                "properties": { "id": 1, "fullname": "Main St", "frominteri": 100, "tointerid": 101, "streetclas": "MI", "munileft": "SJ", "muniright": "SJ" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[0.0, 2640.0], [2640.0, 2640.0]] },
                "properties": { "id": "2", "fullname": "Oak Ave", "frominteri": 101, "tointerid": 102, "streetclas": "MA", "munileft": "CUP", "muniright": "sj" }
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "id": 3, "fullname": "Ghost Rd", "frominteri": 102, "tointerid": 103, "streetclas": null, "munileft": "CUP", "muniright": "CUP" }
            }
        ]
    }"#;

    const INTERSECTIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }, "properties": { "id": 100, "intnum": 5000 } },
            { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0, 2640.0] }, "properties": { "id": 101, "intnum": 5001 } }
        ]
    }"#;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("crash_map_streets_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn centerline_without_fullname_is_unnamed() {
        let feature: Feature = serde_json::from_str(
            r#"{
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [10.0, 0.0]] },
                "properties": { "id": 9, "frominteri": 10, "tointerid": 11, "streetclas": "MI" }
            }"#,
        )
        .unwrap();

        let (segment, _) = parse_centerline(&feature).unwrap();
        assert_eq!(segment.name, "");
        assert!(!segment.is_named());
    }

    #[test]
    fn loads_network_with_lengths() {
        let centerlines = write_temp("centerlines_all.geojson", CENTERLINES);
        let intersections = write_temp("intersections_all.geojson", INTERSECTIONS);

        let network = StreetNetwork::load(&centerlines, &intersections, None).unwrap();
        assert_eq!(network.segment_count(), 3);

        let main = network.segment(SegmentId(1)).unwrap();
        assert_eq!(main.name, "Main St");
        assert_eq!(main.classification, StreetClassification::Minor);
        assert!((main.length_miles.unwrap() - 0.5).abs() < 1e-9);

        let ghost = network.segment(SegmentId(3)).unwrap();
        assert!(ghost.length_miles.is_none());
        assert_eq!(ghost.classification, StreetClassification::Unknown);
        assert!(network.geometry(SegmentId(3)).is_none());

        assert_eq!(
            network.segments_at(IntersectionId(101)),
            &[SegmentId(1), SegmentId(2)]
        );
        assert_eq!(
            network.intersection_by_number(5001).unwrap().id,
            IntersectionId(101)
        );
    }

    #[test]
    fn municipality_filter_matches_either_side() {
        let centerlines = write_temp("centerlines_muni.geojson", CENTERLINES);
        let intersections = write_temp("intersections_muni.geojson", INTERSECTIONS);

        let network = StreetNetwork::load(&centerlines, &intersections, Some("sj")).unwrap();
        let ids: Vec<SegmentId> = network.segments().map(|s| s.id).collect();
        assert_eq!(ids, vec![SegmentId(1), SegmentId(2)]);
    }

    #[test]
    fn missing_endpoint_is_schema_error() {
        let feature: Feature = serde_json::from_str(
            r#"{ "type": "Feature", "geometry": null, "properties": { "id": 9, "frominteri": 1 } }"#,
        )
        .unwrap();
        let err = parse_centerline(&feature).unwrap_err();
        assert!(err.to_string().contains("tointerid"), "{err}");
    }

    #[test]
    fn rejects_non_collection() {
        let path = write_temp("point.geojson", r#"{ "type": "Point", "coordinates": [1.0, 2.0] }"#);
        let err = read_features(&path).unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }), "{err}");
    }
}

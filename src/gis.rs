use std::time::Duration;

use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::http::HttpClient;
use crate::model::{FeatureCollection, Meeting};

/// Property keys that carry a precomputed parcel area, tried in order
/// before falling back to computing one from the geometry.
const AREA_KEYS: [&str; 5] = [
    "AREA_SQ_FT",
    "Shape.STArea()",
    "SHAPE_Area",
    "Shape_Area",
    "area_sqft",
];

/// WGS84 equatorial radius in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;
const SQM_TO_SQFT: f64 = 10.7639;

/// Counters for one geometry-resolution pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GisStats {
    pub attempted: usize,
    pub found: usize,
}

/// Queries an ArcGIS feature service for parcel geometry by parcel
/// identifier. Lookups are best-effort; a failed or empty query yields
/// no feature, never an error.
pub struct GisClient<'a> {
    http: &'a HttpClient,
    query_url: String,
    key_field: &'static str,
    alt_key_field: Option<&'static str>,
    delay: Duration,
}

impl<'a> GisClient<'a> {
    pub fn new(
        http: &'a HttpClient,
        base_url: &str,
        key_field: &'static str,
        alt_key_field: Option<&'static str>,
        delay: Duration,
    ) -> Self {
        Self {
            http,
            query_url: format!("{}/query", base_url.trim_end_matches('/')),
            key_field,
            alt_key_field,
            delay,
        }
    }

    fn query_parcel(&self, field: &str, value: &str) -> Result<Option<Value>> {
        let clause = format!("{field}='{value}'");
        let response: Value = self.http.get_json(
            &self.query_url,
            &[("where", clause.as_str()), ("outFields", "*"), ("f", "geojson")],
        )?;

        let feature = response
            .get("features")
            .and_then(Value::as_array)
            .and_then(|features| features.first())
            .cloned();
        Ok(feature)
    }

    /// Look up one parcel by its primary key, falling back to the alternate
    /// key field when the source defines one.
    pub fn parcel_by_pin(&self, pin: &str) -> Option<Value> {
        match self.query_parcel(self.key_field, pin) {
            Ok(Some(feature)) => return Some(feature),
            Ok(None) => debug!(pin, field = self.key_field, "no parcel feature"),
            Err(err) => warn!(pin, error = %err, "parcel query failed"),
        }

        let alt_field = self.alt_key_field?;
        match self.query_parcel(alt_field, pin) {
            Ok(Some(feature)) => Some(feature),
            Ok(None) => {
                debug!(pin, field = alt_field, "no parcel feature under alternate key");
                None
            }
            Err(err) => {
                warn!(pin, error = %err, "alternate-key parcel query failed");
                None
            }
        }
    }

    /// Resolve geometry for every PIN of every petition across the given
    /// meetings. Each hit becomes one output feature whose properties are
    /// augmented with petition and meeting context; duplicate PINs across
    /// petitions produce duplicate features on purpose, each carrying its
    /// own petition's context.
    pub fn fetch_parcels_for_meetings(&self, meetings: &[Meeting]) -> (FeatureCollection, GisStats) {
        let mut collection = FeatureCollection::empty();
        let mut stats = GisStats::default();

        for meeting in meetings {
            for petition in &meeting.petitions {
                let Some(pins) = &petition.pins else { continue };
                for pin in pins {
                    stats.attempted += 1;
                    let Some(mut feature) = self.parcel_by_pin(pin) else {
                        std::thread::sleep(self.delay);
                        continue;
                    };
                    stats.found += 1;

                    augment_properties(&mut feature, pin, meeting, petition);
                    collection.features.push(feature);
                    std::thread::sleep(self.delay);
                }
            }
        }

        info!(
            attempted = stats.attempted,
            found = stats.found,
            "parcel geometry resolution complete"
        );
        (collection, stats)
    }
}

/// Merge petition and meeting context into a feature's properties without
/// discarding what the feature service returned.
fn augment_properties(
    feature: &mut Value,
    pin: &str,
    meeting: &Meeting,
    petition: &crate::model::Petition,
) {
    if !feature.get("properties").is_some_and(Value::is_object) {
        let Some(map) = feature.as_object_mut() else {
            return;
        };
        map.insert("properties".into(), Value::Object(Map::new()));
    }
    let Some(properties) = feature
        .get_mut("properties")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    properties.insert("pin".into(), json!(pin));
    properties.insert("file_number".into(), json!(petition.file_number));
    properties.insert("petition_number".into(), json!(petition.display_number()));
    properties.insert("petitioner".into(), json!(petition.petitioner));
    properties.insert("status".into(), json!(petition.status));
    properties.insert("location".into(), json!(petition.location));
    properties.insert("current_zoning".into(), json!(petition.current_zoning));
    properties.insert("proposed_zoning".into(), json!(petition.proposed_zoning));
    properties.insert(
        "meeting_date".into(),
        json!(meeting.meeting_date.to_string()),
    );
    properties.insert("meeting_type".into(), json!(meeting.meeting_type));
}

/// Parcel area in square feet: a known property key when the service
/// provides one, otherwise computed from the polygon rings.
pub fn extract_area_sqft(feature: &Value) -> Option<f64> {
    let properties = feature.get("properties")?;
    for key in AREA_KEYS {
        if let Some(area) = properties.get(key).and_then(Value::as_f64) {
            if area > 0.0 {
                return Some(area);
            }
        }
    }
    feature.get("geometry").and_then(geometry_area_sqft)
}

fn geometry_area_sqft(geometry: &Value) -> Option<f64> {
    let rings = match geometry.get("type")?.as_str()? {
        "Polygon" => outer_ring_area(geometry.get("coordinates")?),
        "MultiPolygon" => {
            let polygons = geometry.get("coordinates")?.as_array()?;
            Some(
                polygons
                    .iter()
                    .filter_map(outer_ring_area)
                    .sum(),
            )
        }
        _ => None,
    }?;
    (rings > 0.0).then_some(rings)
}

fn outer_ring_area(coordinates: &Value) -> Option<f64> {
    let ring = coordinates.as_array()?.first()?.as_array()?;
    let points: Vec<(f64, f64)> = ring
        .iter()
        .filter_map(|point| {
            let pair = point.as_array()?;
            Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
        })
        .collect();
    Some(polygon_area_sqft(&points))
}

/// Spherical shoelace over lon/lat vertices. Good to well under a percent
/// at parcel scale, which is all the export surface needs.
pub fn polygon_area_sqft(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..points.len() {
        let (lon1, lat1) = points[i];
        let (lon2, lat2) = points[(i + 1) % points.len()];
        total += (lon2 - lon1).to_radians()
            * (2.0 + lat1.to_radians().sin() + lat2.to_radians().sin());
    }

    let area_sqm = (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs();
    area_sqm * SQM_TO_SQFT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Petition;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn meeting_with(petitions: Vec<Petition>) -> Meeting {
        Meeting {
            meeting_type: "Zoning Committee".to_string(),
            meeting_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            meeting_time: None,
            location: None,
            meeting_details_url: "https://example.com/m/1".to_string(),
            agenda_url: None,
            petitions,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn augment_merges_context_without_discarding_service_properties() {
        let mut feature = json!({
            "type": "Feature",
            "properties": { "OWNER": "SMITH J", "ACRES": 0.21 },
            "geometry": { "type": "Polygon", "coordinates": [] }
        });

        let mut petition = Petition::new("15-25343".to_string());
        petition.petition_number = Some("2025-103".to_string());
        petition.status = Some("Approved".to_string());
        let meeting = meeting_with(vec![petition.clone()]);

        augment_properties(&mut feature, "22310197", &meeting, &petition);

        let properties = feature["properties"].as_object().unwrap();
        assert_eq!(properties["OWNER"], json!("SMITH J"));
        assert_eq!(properties["ACRES"], json!(0.21));
        assert_eq!(properties["pin"], json!("22310197"));
        // The file number survives even when a petition number exists.
        assert_eq!(properties["file_number"], json!("15-25343"));
        assert_eq!(properties["petition_number"], json!("2025-103"));
        assert_eq!(properties["status"], json!("Approved"));
        assert_eq!(properties["meeting_date"], json!("2026-01-20"));
        assert_eq!(properties["meeting_type"], json!("Zoning Committee"));
    }

    #[test]
    fn augment_tolerates_features_without_a_properties_object() {
        let mut feature = json!({ "type": "Feature", "geometry": null });
        let petition = Petition::new("15-1".to_string());
        let meeting = meeting_with(vec![petition.clone()]);

        augment_properties(&mut feature, "12345678", &meeting, &petition);
        assert_eq!(feature["properties"]["pin"], json!("12345678"));
    }

    #[test]
    fn petitions_without_pins_attempt_no_lookups() {
        let http = crate::http::HttpClient::new().unwrap();
        let client = GisClient::new(
            &http,
            "https://gis.invalid/arcgis/rest/services/Parcels/MapServer/0",
            "PID",
            None,
            std::time::Duration::ZERO,
        );

        let mut no_pins = Petition::new("15-1");
        no_pins.pins = Some(Vec::new());
        let unprocessed = Petition::new("15-2");
        let meetings = vec![meeting_with(vec![no_pins, unprocessed])];

        let (collection, stats) = client.fetch_parcels_for_meetings(&meetings);
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.found, 0);
        assert!(collection.is_empty());
    }

    #[test]
    fn area_prefers_known_property_keys_in_order() {
        let feature = json!({
            "properties": { "SHAPE_Area": 9000.0, "AREA_SQ_FT": 8712.0 },
            "geometry": null
        });
        assert_eq!(extract_area_sqft(&feature), Some(8712.0));

        let feature = json!({
            "properties": { "Shape_Area": 4500.5 },
            "geometry": null
        });
        assert_eq!(extract_area_sqft(&feature), Some(4500.5));
    }

    #[test]
    fn area_falls_back_to_polygon_geometry() {
        // Roughly a 111m x 111m square near the equator.
        let feature = json!({
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001], [0.0, 0.0]
                ]]
            }
        });

        let area = extract_area_sqft(&feature).unwrap();
        let expected = 111_194.9_f64.powi(2) * 1.0e-6 * SQM_TO_SQFT;
        assert!((area - expected).abs() / expected < 0.01, "area was {area}");
    }

    #[test]
    fn degenerate_rings_have_no_area() {
        assert_eq!(polygon_area_sqft(&[]), 0.0);
        assert_eq!(polygon_area_sqft(&[(0.0, 0.0), (1.0, 1.0)]), 0.0);

        let feature = json!({
            "properties": {},
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        });
        assert_eq!(extract_area_sqft(&feature), None);
    }
}

//! GeoJSON FeatureCollection import and export.

use crate::error::{MapError, Result};
use crate::feature::{Feature, FeatureRef};
use geojson::{FeatureCollection, GeoJson, Geometry, Value};
use mapcluster_types::geometry::FeatureGeometry;
use serde_json::Map;

/// Parses a FeatureCollection into unattached features.
///
/// Object properties become feature metadata. Features without a geometry
/// are skipped.
pub fn parse_feature_collection(geojson: &str) -> Result<Vec<FeatureRef>> {
    let parsed: GeoJson = geojson
        .parse()
        .map_err(|e| MapError::InvalidGeoJson(format!("Failed to parse GeoJSON: {}", e)))?;

    let collection = match parsed {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(MapError::InvalidGeoJson(
                "Expected a Feature or FeatureCollection, found a bare geometry".to_string(),
            ));
        }
    };

    collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let geometry = feature.geometry?;
            Some(convert_geometry(geometry).map(|geometry| {
                Feature::new(geometry)
                    .with_metadata_map(feature.properties.unwrap_or_default())
                    .into_ref()
            }))
        })
        .collect()
}

fn convert_geometry(geometry: Geometry) -> Result<FeatureGeometry> {
    let geometry: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e| MapError::InvalidGeoJson(format!("Unsupported geometry: {}", e)))?;
    Ok(FeatureGeometry::from(geometry))
}

/// Serializes features as a FeatureCollection. Metadata becomes properties;
/// extrusions are written as their footprint polygon.
pub fn to_feature_collection(features: &[FeatureRef]) -> Result<String> {
    let features = features
        .iter()
        .map(|feature| {
            let state = feature.state();
            let value = Value::from(&state.geometry.to_geo());
            let properties: Map<String, serde_json::Value> = state.metadata.clone();
            geojson::Feature {
                bbox: None,
                geometry: Some(Geometry::new(value)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    serde_json::to_string(&collection).map_err(|e| {
        MapError::Serialization(format!("Failed to serialize feature collection: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapcluster_types::bounds::MapPos;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [24.75, 59.43] },
                "properties": { "name": "Tallinn" }
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]
                },
                "properties": null
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "skipped": true }
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let features = parse_feature_collection(SAMPLE).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].point_pos(), Some(MapPos::new(24.75, 59.43)));
        assert_eq!(
            features[0].metadata_value("name"),
            Some(serde_json::Value::from("Tallinn"))
        );
        assert!(matches!(features[1].geometry(), FeatureGeometry::Line(_)));
        assert!(features[1].metadata().is_empty());
    }

    #[test]
    fn test_multi_geometry_becomes_collection() {
        let json = r#"{
            "type": "Feature",
            "geometry": { "type": "MultiPoint", "coordinates": [[0.0, 0.0], [3.0, 4.0]] },
            "properties": {}
        }"#;
        let features = parse_feature_collection(json).unwrap();
        assert!(matches!(features[0].geometry(), FeatureGeometry::Collection(_)));
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(matches!(
            parse_feature_collection("not json"),
            Err(MapError::InvalidGeoJson(_))
        ));
        assert!(matches!(
            parse_feature_collection(r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#),
            Err(MapError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_export_then_parse_keeps_content() {
        let features = parse_feature_collection(SAMPLE).unwrap();
        let exported = to_feature_collection(&features).unwrap();
        let reparsed = parse_feature_collection(&exported).unwrap();
        assert_eq!(reparsed.len(), features.len());
        for (a, b) in features.iter().zip(&reparsed) {
            assert_eq!(a.geometry(), b.geometry());
            assert_eq!(a.metadata(), b.metadata());
        }
    }
}

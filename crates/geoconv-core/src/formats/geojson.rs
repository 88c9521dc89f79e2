//! GeoJSON format reader

use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{epsg_from_identifier, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct GeoJsonReader;

impl FormatReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let content = fs::read_to_string(path)?;

        let geojson: geojson::GeoJson =
            content.parse().map_err(|e| ConvertError::UnreadableSource {
                path: path.to_path_buf(),
                reason: format!("failed to parse GeoJSON: {e}"),
            })?;

        let name = layer_name(path);
        match geojson {
            geojson::GeoJson::FeatureCollection(fc) => {
                // Legacy `crs` member wins; GeoJSON otherwise mandates WGS84.
                let crs = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(epsg_from_crs_member)
                    .unwrap_or(4326);

                let mut collection = FeatureCollection::new(name, Some(crs));
                for feature in &fc.features {
                    collection.push(convert_feature(feature)?);
                }
                Ok(collection)
            }
            geojson::GeoJson::Feature(feature) => {
                let mut collection = FeatureCollection::new(name, Some(4326));
                collection.push(convert_feature(&feature)?);
                Ok(collection)
            }
            geojson::GeoJson::Geometry(geometry) => {
                let mut collection = FeatureCollection::new(name, Some(4326));
                collection.push(Feature::new(Some(convert_geometry(&geometry)?)));
                Ok(collection)
            }
        }
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json", "geojson"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }
}

pub(crate) fn layer_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string()
}

fn convert_feature(feature: &geojson::Feature) -> Result<Feature> {
    let geometry = feature.geometry.as_ref().map(convert_geometry).transpose()?;
    let mut converted = Feature::new(geometry);
    if let Some(properties) = &feature.properties {
        converted.properties = properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }
    Ok(converted)
}

fn convert_geometry(geometry: &geojson::Geometry) -> Result<geo::Geometry<f64>> {
    geo::Geometry::<f64>::try_from(geometry.value.clone()).map_err(|e| {
        ConvertError::FormatError {
            format: "GeoJSON".to_string(),
            message: format!("unconvertible geometry: {e}"),
        }
    })
}

/// Extract an EPSG code from a legacy GeoJSON `crs` member.
fn epsg_from_crs_member(crs: &serde_json::Value) -> Option<u32> {
    crs.get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .and_then(epsg_from_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_feature_collection_with_crs_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        fs::write(
            &path,
            r#"{
                "type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
                "features": [
                    {
                        "type": "Feature",
                        "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
                        "properties": {"name": "A"}
                    }
                ]
            }"#,
        )
        .unwrap();

        let collection = GeoJsonReader.read(&path).unwrap();
        assert_eq!(collection.name, "layer");
        assert_eq!(collection.crs, Some(3857));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.schema, vec!["name".to_string()]);
    }

    #[test]
    fn defaults_to_wgs84_without_crs_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": []}"#,
        )
        .unwrap();

        let collection = GeoJsonReader.read(&path).unwrap();
        assert_eq!(collection.crs, Some(4326));
        assert!(collection.is_empty());
    }

    #[test]
    fn rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "not json at all").unwrap();

        let err = GeoJsonReader.read(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource { .. }));
    }
}

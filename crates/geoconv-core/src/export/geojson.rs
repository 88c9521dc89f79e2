//! GeoJSON export

use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::export::{ExportArtifact, ExportOptions, FormatWriter};
use crate::model::FeatureCollection;
use crate::registry::OutputFormat;

pub struct GeoJsonWriter;

impl FormatWriter for GeoJsonWriter {
    fn write(
        &self,
        collection: &FeatureCollection,
        base: &str,
        _scratch: &Path,
        _options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let features: Vec<geojson::Feature> = collection
            .features
            .iter()
            .map(|feature| {
                let geometry = feature
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g)));
                let properties: geojson::JsonObject = feature
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                geojson::Feature {
                    bbox: None,
                    geometry,
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        // GeoJSON mandates WGS84; a different CRS is recorded via the legacy
        // named-CRS member so it round-trips through our own reader.
        let foreign_members = match collection.crs {
            Some(epsg) if epsg != 4326 => {
                let mut members = geojson::JsonObject::new();
                members.insert(
                    "crs".to_string(),
                    serde_json::json!({
                        "type": "name",
                        "properties": { "name": format!("EPSG:{epsg}") }
                    }),
                );
                Some(members)
            }
            _ => None,
        };

        let fc = geojson::FeatureCollection { bbox: None, features, foreign_members };
        let bytes = serde_json::to_vec_pretty(&fc)
            .map_err(|e| ConvertError::Serialization(format!("GeoJSON encoding failed: {e}")))?;

        Ok(ExportArtifact::new(bytes, format!("{base}.geojson")))
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::GeoJson
    }
}

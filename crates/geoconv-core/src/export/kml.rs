//! KML export
//!
//! KML carries no CRS metadata and is defined over WGS84. Collections in any
//! other (or unknown) CRS are refused unless the caller opts into the
//! `force_wgs84_label` escape hatch, which writes the coordinates unchanged
//! and surfaces a note saying so.

use kml::types::{
    Coord as KmlCoord, Geometry as KmlGeometry, KmlDocument, KmlVersion,
    LineString as KmlLineString, LinearRing, MultiGeometry, Placemark, Point as KmlPoint,
    Polygon as KmlPolygon,
};
use kml::Kml;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::export::{ExportArtifact, ExportOptions, FormatWriter};
use crate::model::{Feature, FeatureCollection};
use crate::registry::OutputFormat;

pub struct KmlWriter;

impl FormatWriter for KmlWriter {
    fn write(
        &self,
        collection: &FeatureCollection,
        base: &str,
        _scratch: &Path,
        options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let mut notes = Vec::new();

        if collection.crs != Some(4326) {
            if options.force_wgs84_label {
                notes.push(format!(
                    "Labeled output as WGS84 without reprojection (source CRS: {}).",
                    collection.crs_label()
                ));
            } else {
                return Err(ConvertError::FormatError {
                    format: "KML".to_string(),
                    message: format!(
                        "KML requires WGS84 coordinates but the collection CRS is {}; \
                         reproject to EPSG:4326 first, or try GeoJSON or GeoPackage",
                        collection.crs_label()
                    ),
                });
            }
        }

        let placemarks: Vec<Kml> = collection
            .features
            .iter()
            .map(|feature| Kml::Placemark(to_placemark(feature)))
            .collect();

        let document = Kml::Document {
            attrs: HashMap::new(),
            elements: placemarks,
        };
        let root = Kml::KmlDocument(KmlDocument {
            version: KmlVersion::V22,
            attrs: HashMap::from([(
                "xmlns".to_string(),
                "http://www.opengis.net/kml/2.2".to_string(),
            )]),
            elements: vec![document],
        });

        let mut bytes = Vec::new();
        let mut writer = kml::KmlWriter::from_writer(&mut bytes);
        writer.write(&root).map_err(|e| ConvertError::FormatError {
            format: "KML".to_string(),
            message: format!("encoding failed: {e}; try GeoJSON or GeoPackage"),
        })?;

        let mut artifact = ExportArtifact::new(bytes, format!("{base}.kml"));
        artifact.notes = notes;
        Ok(artifact)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Kml
    }
}

fn to_placemark(feature: &Feature) -> Placemark {
    let name = feature
        .properties
        .get("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    // Remaining attributes become description lines.
    let mut lines: Vec<String> = feature
        .properties
        .iter()
        .filter(|(k, _)| k.as_str() != "name")
        .map(|(k, v)| format!("{k}: {}", scalar_text(v)))
        .collect();
    lines.sort();
    let description = if lines.is_empty() { None } else { Some(lines.join("\n")) };

    Placemark {
        name,
        description,
        geometry: feature.geometry.as_ref().map(to_kml_geometry),
        ..Default::default()
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_kml_geometry(geometry: &geo::Geometry<f64>) -> KmlGeometry {
    match geometry {
        geo::Geometry::Point(p) => KmlGeometry::Point(point(p.x(), p.y())),
        geo::Geometry::Line(l) => KmlGeometry::LineString(KmlLineString {
            coords: vec![coord(l.start.x, l.start.y), coord(l.end.x, l.end.y)],
            ..Default::default()
        }),
        geo::Geometry::LineString(line) => KmlGeometry::LineString(line_string(line)),
        geo::Geometry::Polygon(polygon) => KmlGeometry::Polygon(kml_polygon(polygon)),
        geo::Geometry::Rect(rect) => KmlGeometry::Polygon(kml_polygon(&rect.to_polygon())),
        geo::Geometry::Triangle(tri) => KmlGeometry::Polygon(kml_polygon(&tri.to_polygon())),
        geo::Geometry::MultiPoint(mp) => KmlGeometry::MultiGeometry(MultiGeometry {
            geometries: mp
                .iter()
                .map(|p| KmlGeometry::Point(point(p.x(), p.y())))
                .collect(),
            ..Default::default()
        }),
        geo::Geometry::MultiLineString(lines) => KmlGeometry::MultiGeometry(MultiGeometry {
            geometries: lines
                .iter()
                .map(|line| KmlGeometry::LineString(line_string(line)))
                .collect(),
            ..Default::default()
        }),
        geo::Geometry::MultiPolygon(polygons) => KmlGeometry::MultiGeometry(MultiGeometry {
            geometries: polygons
                .iter()
                .map(|polygon| KmlGeometry::Polygon(kml_polygon(polygon)))
                .collect(),
            ..Default::default()
        }),
        geo::Geometry::GeometryCollection(gc) => KmlGeometry::MultiGeometry(MultiGeometry {
            geometries: gc.iter().map(to_kml_geometry).collect(),
            ..Default::default()
        }),
    }
}

fn point(x: f64, y: f64) -> KmlPoint {
    KmlPoint { coord: coord(x, y), ..Default::default() }
}

fn coord(x: f64, y: f64) -> KmlCoord {
    KmlCoord { x, y, z: None }
}

fn line_string(line: &geo::LineString<f64>) -> KmlLineString {
    KmlLineString {
        coords: line.coords().map(|c| coord(c.x, c.y)).collect(),
        ..Default::default()
    }
}

fn ring(line: &geo::LineString<f64>) -> LinearRing {
    LinearRing {
        coords: line.coords().map(|c| coord(c.x, c.y)).collect(),
        ..Default::default()
    }
}

fn kml_polygon(polygon: &geo::Polygon<f64>) -> KmlPolygon {
    KmlPolygon {
        outer: ring(polygon.exterior()),
        inner: polygon.interiors().iter().map(ring).collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wgs84_points() -> FeatureCollection {
        let mut collection = FeatureCollection::new("sites", Some(4326));
        let mut feature =
            Feature::new(Some(geo::Geometry::Point(geo::Point::new(77.6, 12.9))));
        feature.properties.insert("name".to_string(), serde_json::json!("HQ"));
        collection.push(feature);
        collection
    }

    #[test]
    fn writes_placemarks() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = KmlWriter
            .write(&wgs84_points(), "sites", dir.path(), &ExportOptions::default())
            .unwrap();

        assert_eq!(artifact.file_name, "sites.kml");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("<Placemark>"));
        assert!(text.contains("HQ"));
        assert!(text.contains("77.6"));
    }

    #[test]
    fn refuses_non_wgs84_by_default() {
        let mut collection = wgs84_points();
        collection.crs = Some(32643);

        let dir = tempfile::tempdir().unwrap();
        let err = KmlWriter
            .write(&collection, "sites", dir.path(), &ExportOptions::default())
            .unwrap_err();
        match err {
            ConvertError::FormatError { format, message } => {
                assert_eq!(format, "KML");
                assert!(message.contains("EPSG:32643"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn relabel_is_opt_in_and_noted() {
        let mut collection = wgs84_points();
        collection.crs = None;

        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions { force_wgs84_label: true, ..Default::default() };
        let artifact = KmlWriter.write(&collection, "sites", dir.path(), &options).unwrap();

        assert_eq!(artifact.notes.len(), 1);
        assert!(artifact.notes[0].contains("without reprojection"));
    }

    #[test]
    fn empty_collection_is_valid_kml() {
        let collection = FeatureCollection::new("empty", Some(4326));
        let dir = tempfile::tempdir().unwrap();
        let artifact = KmlWriter
            .write(&collection, "empty", dir.path(), &ExportOptions::default())
            .unwrap();

        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("kml"));
    }
}

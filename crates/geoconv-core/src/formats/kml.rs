//! KML format reader
//!
//! Walks the KML document tree recursively, turning every placemark with a
//! geometry into a feature. Folder hierarchy is preserved in a `folder`
//! attribute. KML is always WGS84.

use kml::types::Geometry as KmlGeometry;
use kml::Kml;
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{geojson::layer_name, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct KmlReader;

impl FormatReader for KmlReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let content = fs::read_to_string(path)?;

        let kml: Kml = content.parse().map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to parse KML: {e}"),
        })?;

        let mut collection = FeatureCollection::new(layer_name(path), Some(4326));
        collect_features(&kml, &mut collection, &[]);
        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["kml"]
    }

    fn format_name(&self) -> &str {
        "KML"
    }
}

fn collect_features(kml: &Kml, collection: &mut FeatureCollection, folder_path: &[String]) {
    match kml {
        Kml::KmlDocument(doc) => {
            for element in doc.elements.iter() {
                collect_features(element, collection, folder_path);
            }
        }
        Kml::Document { elements, .. } => {
            for element in elements {
                collect_features(element, collection, folder_path);
            }
        }
        Kml::Folder { elements, .. } => {
            // The folder's <name> is parsed as a child element, not an
            // attribute of the folder itself.
            let mut nested = folder_path.to_vec();
            if let Some(name) = child_element_text(elements, "name") {
                nested.push(name);
            }
            for element in elements {
                collect_features(element, collection, &nested);
            }
        }
        Kml::Placemark(placemark) => {
            let Some(kml_geometry) = &placemark.geometry else { return };
            let Some(geometry) = convert_geometry(kml_geometry) else { return };

            let mut feature = Feature::new(Some(geometry));
            if let Some(name) = &placemark.name {
                feature.properties.insert("name".to_string(), serde_json::json!(name));
            }
            if let Some(description) = &placemark.description {
                feature
                    .properties
                    .insert("description".to_string(), serde_json::json!(description));
            }
            if !folder_path.is_empty() {
                feature
                    .properties
                    .insert("folder".to_string(), serde_json::json!(folder_path.join("/")));
            }
            collection.push(feature);
        }
        // NetworkLink, GroundOverlay, styles etc. carry no feature geometry.
        _ => {}
    }
}

/// Text content of the first child element with the given tag name.
fn child_element_text(elements: &[Kml], tag: &str) -> Option<String> {
    elements.iter().find_map(|element| match element {
        Kml::Element(e) if e.name == tag => e.content.clone(),
        _ => None,
    })
}

/// Convert a KML geometry to geo. Returns `None` for non-spatial elements.
fn convert_geometry(geometry: &KmlGeometry) -> Option<geo::Geometry<f64>> {
    match geometry {
        KmlGeometry::Point(point) => {
            Some(geo::Geometry::Point(geo::Point::new(point.coord.x, point.coord.y)))
        }
        KmlGeometry::LineString(line) => Some(geo::Geometry::LineString(coords_to_line(
            line.coords.iter().map(|c| (c.x, c.y)),
        ))),
        KmlGeometry::LinearRing(ring) => Some(geo::Geometry::LineString(coords_to_line(
            ring.coords.iter().map(|c| (c.x, c.y)),
        ))),
        KmlGeometry::Polygon(polygon) => {
            let exterior = coords_to_line(polygon.outer.coords.iter().map(|c| (c.x, c.y)));
            let interiors: Vec<geo::LineString<f64>> = polygon
                .inner
                .iter()
                .map(|ring| coords_to_line(ring.coords.iter().map(|c| (c.x, c.y))))
                .collect();
            Some(geo::Geometry::Polygon(geo::Polygon::new(exterior, interiors)))
        }
        KmlGeometry::MultiGeometry(multi) => {
            let members: Vec<geo::Geometry<f64>> =
                multi.geometries.iter().filter_map(convert_geometry).collect();
            if members.is_empty() {
                return None;
            }
            Some(merge_members(members))
        }
        _ => None,
    }
}

/// Collapse a MultiGeometry into the tightest geo multi-variant.
fn merge_members(members: Vec<geo::Geometry<f64>>) -> geo::Geometry<f64> {
    if members.iter().all(|g| matches!(g, geo::Geometry::Point(_))) {
        let points = members
            .into_iter()
            .map(|g| match g {
                geo::Geometry::Point(p) => p,
                _ => unreachable!(),
            })
            .collect();
        geo::Geometry::MultiPoint(geo::MultiPoint::new(points))
    } else if members.iter().all(|g| matches!(g, geo::Geometry::LineString(_))) {
        let lines = members
            .into_iter()
            .map(|g| match g {
                geo::Geometry::LineString(line) => line,
                _ => unreachable!(),
            })
            .collect();
        geo::Geometry::MultiLineString(geo::MultiLineString::new(lines))
    } else if members.iter().all(|g| matches!(g, geo::Geometry::Polygon(_))) {
        let polygons = members
            .into_iter()
            .map(|g| match g {
                geo::Geometry::Polygon(polygon) => polygon,
                _ => unreachable!(),
            })
            .collect();
        geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons))
    } else {
        geo::Geometry::GeometryCollection(geo::GeometryCollection::from(members))
    }
}

fn coords_to_line(coords: impl Iterator<Item = (f64, f64)>) -> geo::LineString<f64> {
    coords.map(|(x, y)| geo::coord! { x: x, y: y }).collect::<Vec<_>>().into()
}

//! Basic DXF (CAD) reader
//!
//! Extracts POINT, LINE and LWPOLYLINE entities from model space. CAD
//! drawings carry no CRS, so the collection CRS is left unknown and must be
//! supplied by the caller before reprojection. The source layer name is kept
//! as a `layer` attribute.

use dxf::entities::EntityType;
use dxf::Drawing;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{geojson::layer_name, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct DxfReader;

impl FormatReader for DxfReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let drawing =
            Drawing::load_file(path).map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to parse DXF: {e}"),
        })?;

        let mut collection = FeatureCollection::new(layer_name(path), None);

        for entity in drawing.entities() {
            let (geometry, kind) = match &entity.specific {
                EntityType::ModelPoint(point) => (
                    geo::Geometry::Point(geo::Point::new(point.location.x, point.location.y)),
                    "point",
                ),
                EntityType::Line(line) => (
                    geo::Geometry::LineString(
                        vec![
                            geo::coord! { x: line.p1.x, y: line.p1.y },
                            geo::coord! { x: line.p2.x, y: line.p2.y },
                        ]
                        .into(),
                    ),
                    "line",
                ),
                EntityType::LwPolyline(polyline) => {
                    if polyline.vertices.len() < 2 {
                        continue;
                    }
                    let mut coords: Vec<geo::Coord<f64>> = polyline
                        .vertices
                        .iter()
                        .map(|v| geo::coord! { x: v.x, y: v.y })
                        .collect();
                    // Closed polylines become polygons.
                    if polyline.is_closed() && coords.len() >= 3 {
                        if coords.first() != coords.last() {
                            coords.push(coords[0]);
                        }
                        (
                            geo::Geometry::Polygon(geo::Polygon::new(coords.into(), vec![])),
                            "polyline",
                        )
                    } else {
                        (geo::Geometry::LineString(coords.into()), "polyline")
                    }
                }
                _ => continue,
            };

            let mut feature = Feature::new(Some(geometry));
            feature.properties.insert("kind".to_string(), serde_json::json!(kind));
            feature
                .properties
                .insert("layer".to_string(), serde_json::json!(entity.common.layer));
            collection.push(feature);
        }

        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["dxf"]
    }

    fn format_name(&self) -> &str {
        "DXF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf::entities::{Entity, Line};
    use dxf::Point as DxfPoint;

    #[test]
    fn reads_line_entities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.dxf");

        let mut drawing = Drawing::new();
        let line = Line::new(DxfPoint::new(0.0, 0.0, 0.0), DxfPoint::new(5.0, 5.0, 0.0));
        drawing.add_entity(Entity::new(EntityType::Line(line)));
        drawing.save_file(&path).unwrap();

        let collection = DxfReader.read(&path).unwrap();
        assert_eq!(collection.crs, None);
        assert_eq!(collection.len(), 1);
        assert!(matches!(
            collection.features[0].geometry,
            Some(geo::Geometry::LineString(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dxf");
        std::fs::write(&path, "not a drawing").unwrap();

        let err = DxfReader.read(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource { .. }));
    }
}

//! GPX export
//!
//! Points become waypoints and lines become tracks. GPX has no notion of
//! areal geometry, so polygonal collections are refused with a pointer to a
//! format that can hold them. Like KML, GPX is WGS84-only.

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::export::{ExportArtifact, ExportOptions, FormatWriter};
use crate::model::FeatureCollection;
use crate::registry::OutputFormat;

pub struct GpxWriter;

impl FormatWriter for GpxWriter {
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
                    format: "GPX".to_string(),
                    message: format!(
                        "GPX requires WGS84 coordinates but the collection CRS is {}; \
                         reproject to EPSG:4326 first",
                        collection.crs_label()
                    ),
                });
            }
        }

        let mut gpx = Gpx {
            version: GpxVersion::Gpx11,
            creator: Some("geoconv".to_string()),
            ..Default::default()
        };

        for feature in &collection.features {
            let name = feature
                .properties
                .get("name")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            match &feature.geometry {
                None => {}
                Some(geo::Geometry::Point(p)) => {
                    let mut waypoint = Waypoint::new(*p);
                    waypoint.name = name;
                    gpx.waypoints.push(waypoint);
                }
                Some(geo::Geometry::MultiPoint(mp)) => {
                    for p in mp.iter() {
                        let mut waypoint = Waypoint::new(*p);
                        waypoint.name = name.clone();
                        gpx.waypoints.push(waypoint);
                    }
                }
                Some(geo::Geometry::LineString(line)) => {
                    gpx.tracks.push(track(name, std::slice::from_ref(line)));
                }
                Some(geo::Geometry::MultiLineString(lines)) => {
                    gpx.tracks.push(track(name, &lines.0));
                }
                Some(other) => {
                    return Err(ConvertError::FormatError {
                        format: "GPX".to_string(),
                        message: format!(
                            "{} geometries cannot be represented in GPX; \
                             try GeoJSON or GeoPackage",
                            crate::model::geometry_type_name(other)
                        ),
                    });
                }
            }
        }

        let mut bytes = Vec::new();
        gpx::write(&gpx, &mut bytes).map_err(|e| ConvertError::FormatError {
            format: "GPX".to_string(),
            message: format!("encoding failed: {e}; try GeoJSON or GeoPackage"),
        })?;

        let mut artifact = ExportArtifact::new(bytes, format!("{base}.gpx"));
        artifact.notes = notes;
        Ok(artifact)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Gpx
    }
}

fn track(name: Option<String>, lines: &[geo::LineString<f64>]) -> Track {
    let segments = lines
        .iter()
        .map(|line| TrackSegment {
            points: line.points().map(Waypoint::new).collect(),
        })
        .collect();
    Track { name, segments, ..Default::default() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;

    #[test]
    fn points_become_waypoints_lines_become_tracks() {
        let mut collection = FeatureCollection::new("trail", Some(4326));
        let mut wpt = Feature::new(Some(geo::Geometry::Point(geo::Point::new(77.6, 12.9))));
        wpt.properties.insert("name".to_string(), serde_json::json!("Start"));
        collection.push(wpt);
        collection.push(Feature::new(Some(geo::Geometry::LineString(
            vec![geo::coord! { x: 77.6, y: 12.9 }, geo::coord! { x: 77.7, y: 13.0 }].into(),
        ))));

        let dir = tempfile::tempdir().unwrap();
        let artifact = GpxWriter
            .write(&collection, "trail", dir.path(), &ExportOptions::default())
            .unwrap();

        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("<wpt"));
        assert!(text.contains("<trk>"));
        assert!(text.contains("Start"));
    }

    #[test]
    fn polygons_are_refused_with_remediation() {
        let mut collection = FeatureCollection::new("zones", Some(4326));
        collection.push(Feature::new(Some(geo::Geometry::Polygon(geo::Polygon::new(
            vec![
                geo::coord! { x: 0.0, y: 0.0 },
                geo::coord! { x: 1.0, y: 0.0 },
                geo::coord! { x: 1.0, y: 1.0 },
                geo::coord! { x: 0.0, y: 0.0 },
            ]
            .into(),
            vec![],
        )))));

        let dir = tempfile::tempdir().unwrap();
        let err = GpxWriter
            .write(&collection, "zones", dir.path(), &ExportOptions::default())
            .unwrap_err();
        match err {
            ConvertError::FormatError { message, .. } => {
                assert!(message.contains("Polygon"));
                assert!(message.contains("GeoPackage"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn refuses_unknown_crs_by_default() {
        let collection = FeatureCollection::new("t", None);
        let dir = tempfile::tempdir().unwrap();
        let err = GpxWriter
            .write(&collection, "t", dir.path(), &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::FormatError { .. }));
    }
}

//! GPX format reader
//!
//! Waypoints become points, track segments and routes become line strings.
//! GPX coordinates are always WGS84.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{geojson::layer_name, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct GpxReader;

impl FormatReader for GpxReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let file = File::open(path)?;
        let gpx = gpx::read(BufReader::new(file)).map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to parse GPX: {e}"),
        })?;

        let mut collection = FeatureCollection::new(layer_name(path), Some(4326));

        for waypoint in &gpx.waypoints {
            let mut feature =
                Feature::new(Some(geo::Geometry::Point(waypoint.point())));
            feature.properties.insert("kind".to_string(), serde_json::json!("waypoint"));
            if let Some(name) = &waypoint.name {
                feature.properties.insert("name".to_string(), serde_json::json!(name));
            }
            if let Some(elevation) = waypoint.elevation {
                feature.properties.insert("elevation".to_string(), serde_json::json!(elevation));
            }
            collection.push(feature);
        }

        for (track_idx, track) in gpx.tracks.iter().enumerate() {
            for (segment_idx, segment) in track.segments.iter().enumerate() {
                if segment.points.is_empty() {
                    continue;
                }
                let line: geo::LineString<f64> =
                    segment.points.iter().map(|w| w.point().into()).collect::<Vec<geo::Coord<f64>>>().into();
                let mut feature = Feature::new(Some(geo::Geometry::LineString(line)));
                feature.properties.insert("kind".to_string(), serde_json::json!("track"));
                let name = track
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("track_{track_idx}"));
                feature.properties.insert("name".to_string(), serde_json::json!(name));
                feature.properties.insert("segment".to_string(), serde_json::json!(segment_idx));
                collection.push(feature);
            }
        }

        for (route_idx, route) in gpx.routes.iter().enumerate() {
            if route.points.is_empty() {
                continue;
            }
            let line: geo::LineString<f64> =
                route.points.iter().map(|w| w.point().into()).collect::<Vec<geo::Coord<f64>>>().into();
            let mut feature = Feature::new(Some(geo::Geometry::LineString(line)));
            feature.properties.insert("kind".to_string(), serde_json::json!("route"));
            let name = route
                .name
                .clone()
                .unwrap_or_else(|| format!("route_{route_idx}"));
            feature.properties.insert("name".to_string(), serde_json::json!(name));
            collection.push(feature);
        }

        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["gpx"]
    }

    fn format_name(&self) -> &str {
        "GPX"
    }
}

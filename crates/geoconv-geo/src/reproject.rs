//! CRS reprojection
//!
//! Moves a whole collection into a target CRS. Reprojection never fails the
//! conversion: every refusal or error is reported as a note and the
//! collection keeps its previous coordinates.

use geo::MapCoords;
use proj::Proj;
use tracing::debug;

use geoconv_core::model::FeatureCollection;

/// Reproject a collection to the target EPSG code (given as `"3857"` or
/// `"EPSG:3857"`). Returns a report note, or `None` when the collection is
/// already in the target CRS.
pub fn reproject(collection: &mut FeatureCollection, target: &str) -> Option<String> {
    let Some(target_epsg) = parse_target(target) else {
        return Some("Invalid target EPSG; kept original CRS.".to_string());
    };

    let Some(source_epsg) = collection.crs else {
        return Some("Source CRS unknown; cannot reproject.".to_string());
    };

    if source_epsg == target_epsg {
        return None;
    }

    let proj = match Proj::new_known_crs(
        &format!("EPSG:{source_epsg}"),
        &format!("EPSG:{target_epsg}"),
        None,
    ) {
        Ok(proj) => proj,
        Err(e) => return Some(format!("Reprojection failed: {e}")),
    };

    // Transform into a staging vec so a mid-collection failure leaves the
    // original coordinates untouched.
    let mut transformed = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let geometry = match &feature.geometry {
            None => None,
            Some(geometry) => {
                let result = geometry.try_map_coords(|coord| {
                    proj.convert((coord.x, coord.y))
                        .map(|(x, y)| geo::coord! { x: x, y: y })
                });
                match result {
                    Ok(geometry) => Some(geometry),
                    Err(e) => return Some(format!("Reprojection failed: {e}")),
                }
            }
        };
        transformed.push(geometry);
    }

    for (feature, geometry) in collection.features.iter_mut().zip(transformed) {
        feature.geometry = geometry;
    }
    collection.crs = Some(target_epsg);
    debug!(from = source_epsg, to = target_epsg, "reprojected");
    Some(format!("Reprojected to EPSG:{target_epsg}."))
}

fn parse_target(target: &str) -> Option<u32> {
    let trimmed = target.trim();
    let code = trimmed
        .strip_prefix("EPSG:")
        .or_else(|| trimmed.strip_prefix("epsg:"))
        .unwrap_or(trimmed);
    code.parse().ok().filter(|&epsg| epsg > 0)
}

//! Geometry conditioning stages
//!
//! Runs up to three optional stages over a collection: structural repair,
//! zero-width buffer fix for self-intersecting polygons, and topology-aware
//! simplification. A failed stage never aborts the conversion; it becomes a
//! note and the collection is left as the previous stage produced it.

use geo::{SimplifyVwPreserve, Validation};
use tracing::debug;

use geoconv_core::error::{ConvertError, Result};
use geoconv_core::model::FeatureCollection;

use crate::validation::validate_geometry;

/// Conditioning behavior toggles.
#[derive(Debug, Clone)]
pub struct ConditionOptions {
    /// Repair structurally broken geometries (open rings, short lines,
    /// non-finite coordinates).
    pub fix_invalid: bool,
    /// Rebuild self-intersecting polygons with a zero-width buffer.
    pub buffer_fallback: bool,
    /// Visvalingam-Whyatt simplification tolerance, off when `None`.
    pub simplify_tolerance: Option<f64>,
}

impl Default for ConditionOptions {
    fn default() -> Self {
        Self { fix_invalid: true, buffer_fallback: true, simplify_tolerance: None }
    }
}

/// Run the enabled conditioning stages, returning report notes.
pub fn condition(collection: &mut FeatureCollection, options: &ConditionOptions) -> Vec<String> {
    let mut notes = Vec::new();

    if options.fix_invalid {
        let dropped = repair_stage(collection);
        notes.push("Applied validity repair.".to_string());
        if dropped > 0 {
            notes.push(format!("Dropped {dropped} unrepairable geometry(ies)."));
        }
    }

    if options.buffer_fallback {
        match buffer_stage(collection) {
            Ok(fixed) => {
                debug!(fixed, "zero-width buffer fix");
                notes.push("Applied zero-width buffer fix.".to_string());
            }
            Err(e) => notes.push(e.to_string()),
        }
    }

    // Tolerance zero means the stage is off.
    if let Some(tolerance) = options.simplify_tolerance.filter(|t| *t != 0.0) {
        match simplify_stage(collection, tolerance) {
            Ok(()) => notes.push(format!("Simplified (tol={tolerance}).")),
            Err(e) => notes.push(e.to_string()),
        }
    }

    notes
}

/// Repair structurally broken geometries in place. Returns how many had to
/// be dropped as unrepairable.
fn repair_stage(collection: &mut FeatureCollection) -> usize {
    let mut repaired = 0usize;
    let mut dropped = 0usize;

    for feature in &mut collection.features {
        let Some(geometry) = &feature.geometry else { continue };
        if validate_geometry(geometry).is_valid {
            continue;
        }
        match repair_geometry(geometry) {
            Some(fixed) => {
                feature.geometry = Some(fixed);
                repaired += 1;
            }
            None => {
                feature.geometry = None;
                dropped += 1;
            }
        }
    }

    debug!(repaired, dropped, "validity repair");
    dropped
}

/// Structural repair: filter non-finite coordinates, drop degenerate parts,
/// close open rings. Returns `None` when nothing salvageable remains.
fn repair_geometry(geometry: &geo::Geometry<f64>) -> Option<geo::Geometry<f64>> {
    match geometry {
        geo::Geometry::Point(p) => {
            (p.x().is_finite() && p.y().is_finite()).then(|| geo::Geometry::Point(*p))
        }
        geo::Geometry::Line(l) => {
            let coords = finite_coords(&[l.start, l.end]);
            (coords.len() == 2).then(|| geo::Geometry::Line(geo::Line::new(coords[0], coords[1])))
        }
        geo::Geometry::LineString(line) => {
            repair_linestring(line).map(geo::Geometry::LineString)
        }
        geo::Geometry::Polygon(polygon) => repair_polygon(polygon).map(geo::Geometry::Polygon),
        geo::Geometry::Rect(r) => repair_polygon(&r.to_polygon()).map(geo::Geometry::Polygon),
        geo::Geometry::Triangle(t) => {
            repair_polygon(&t.to_polygon()).map(geo::Geometry::Polygon)
        }
        geo::Geometry::MultiPoint(mp) => {
            let points: Vec<geo::Point<f64>> = mp
                .iter()
                .copied()
                .filter(|p| p.x().is_finite() && p.y().is_finite())
                .collect();
            (!points.is_empty())
                .then(|| geo::Geometry::MultiPoint(geo::MultiPoint::new(points)))
        }
        geo::Geometry::MultiLineString(mls) => {
            let lines: Vec<geo::LineString<f64>> =
                mls.iter().filter_map(repair_linestring).collect();
            (!lines.is_empty())
                .then(|| geo::Geometry::MultiLineString(geo::MultiLineString::new(lines)))
        }
        geo::Geometry::MultiPolygon(mp) => {
            let polygons: Vec<geo::Polygon<f64>> =
                mp.iter().filter_map(repair_polygon).collect();
            (!polygons.is_empty())
                .then(|| geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons)))
        }
        geo::Geometry::GeometryCollection(gc) => {
            let members: Vec<geo::Geometry<f64>> =
                gc.iter().filter_map(repair_geometry).collect();
            (!members.is_empty())
                .then(|| geo::Geometry::GeometryCollection(geo::GeometryCollection::from(members)))
        }
    }
}

fn finite_coords(coords: &[geo::Coord<f64>]) -> Vec<geo::Coord<f64>> {
    coords.iter().copied().filter(|c| c.x.is_finite() && c.y.is_finite()).collect()
}

fn repair_linestring(line: &geo::LineString<f64>) -> Option<geo::LineString<f64>> {
    let mut coords = finite_coords(&line.0);
    coords.dedup();
    (coords.len() >= 2).then(|| coords.into())
}

fn repair_ring(ring: &geo::LineString<f64>) -> Option<geo::LineString<f64>> {
    let mut coords = finite_coords(&ring.0);
    coords.dedup();
    if coords.len() < 3 {
        return None;
    }
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    (coords.len() >= 4).then(|| coords.into())
}

fn repair_polygon(polygon: &geo::Polygon<f64>) -> Option<geo::Polygon<f64>> {
    let exterior = repair_ring(polygon.exterior())?;
    let interiors: Vec<geo::LineString<f64>> =
        polygon.interiors().iter().filter_map(repair_ring).collect();
    Some(geo::Polygon::new(exterior, interiors))
}

/// Rebuild self-intersecting polygons via a zero-width buffer. Returns the
/// number of geometries rewritten.
fn buffer_stage(collection: &mut FeatureCollection) -> Result<usize> {
    let mut fixed = 0usize;

    for feature in &mut collection.features {
        let rebuilt = match &feature.geometry {
            Some(geo::Geometry::Polygon(polygon)) if !polygon.is_valid() => {
                Some(zero_buffer(std::slice::from_ref(polygon))?)
            }
            Some(geo::Geometry::MultiPolygon(mp)) if !mp.is_valid() => {
                Some(zero_buffer(&mp.0)?)
            }
            _ => None,
        };
        if let Some(geometry) = rebuilt {
            feature.geometry = Some(geometry);
            fixed += 1;
        }
    }

    Ok(fixed)
}

fn zero_buffer(polygons: &[geo::Polygon<f64>]) -> Result<geo::Geometry<f64>> {
    let mut rebuilt: Vec<geo::Polygon<f64>> = Vec::new();
    for polygon in polygons {
        if polygon.exterior().0.len() < 4 {
            return Err(ConvertError::StageFailure {
                stage: "Zero-width buffer".to_string(),
                reason: "degenerate exterior ring".to_string(),
            });
        }
        // The skeleton buffer can panic on badly degenerate rings; contain it
        // so the stage degrades to a note instead of aborting the job.
        let buffered = std::panic::catch_unwind(|| geo_buffer::buffer_polygon(polygon, 0.0))
            .map_err(|_| ConvertError::StageFailure {
                stage: "Zero-width buffer".to_string(),
                reason: "buffer operation failed on a degenerate ring".to_string(),
            })?;
        rebuilt.extend(buffered.0);
    }

    match rebuilt.len() {
        0 => Err(ConvertError::StageFailure {
            stage: "Zero-width buffer".to_string(),
            reason: "buffer produced no area".to_string(),
        }),
        1 => Ok(geo::Geometry::Polygon(rebuilt.into_iter().next().unwrap())),
        _ => Ok(geo::Geometry::MultiPolygon(geo::MultiPolygon::new(rebuilt))),
    }
}

/// Topology-preserving Visvalingam-Whyatt simplification.
fn simplify_stage(collection: &mut FeatureCollection, tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ConvertError::StageFailure {
            stage: "Simplification".to_string(),
            reason: format!("tolerance must be a positive number, got {tolerance}"),
        });
    }

    for feature in &mut collection.features {
        let Some(geometry) = &feature.geometry else { continue };
        let simplified = match geometry {
            geo::Geometry::LineString(line) => {
                geo::Geometry::LineString(line.simplify_vw_preserve(&tolerance))
            }
            geo::Geometry::MultiLineString(lines) => {
                geo::Geometry::MultiLineString(lines.simplify_vw_preserve(&tolerance))
            }
            geo::Geometry::Polygon(polygon) => {
                geo::Geometry::Polygon(polygon.simplify_vw_preserve(&tolerance))
            }
            geo::Geometry::MultiPolygon(polygons) => {
                geo::Geometry::MultiPolygon(polygons.simplify_vw_preserve(&tolerance))
            }
            // Points and collections pass through unchanged.
            _ => continue,
        };
        feature.geometry = Some(simplified);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;
    use geoconv_core::model::Feature;

    fn collection_with(geometry: geo::Geometry<f64>) -> FeatureCollection {
        let mut collection = FeatureCollection::new("test", Some(4326));
        collection.push(Feature::new(Some(geometry)));
        collection
    }

    #[test]
    fn non_finite_coordinates_are_repaired_away() {
        let line: geo::LineString<f64> = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: f64::NAN, y: 1.0 },
            coord! { x: 2.0, y: 2.0 },
        ]
        .into();
        let mut collection = collection_with(geo::Geometry::LineString(line));

        let notes = condition(&mut collection, &ConditionOptions::default());
        assert!(notes.contains(&"Applied validity repair.".to_string()));

        match &collection.features[0].geometry {
            Some(geo::Geometry::LineString(line)) => {
                assert_eq!(line.0.len(), 2);
                assert!(line.0.iter().all(|c| c.x.is_finite() && c.y.is_finite()));
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn unrepairable_geometry_is_dropped() {
        let short: geo::LineString<f64> = vec![coord! { x: 0.0, y: 0.0 }].into();
        let mut collection = collection_with(geo::Geometry::LineString(short));

        let notes = condition(&mut collection, &ConditionOptions::default());
        assert!(notes.iter().any(|n| n.contains("Dropped 1")));
        assert!(collection.features[0].geometry.is_none());
    }

    #[test]
    fn degenerate_polygon_is_dropped() {
        // A two-point ring closes to three coordinates, below the minimum.
        let tiny: geo::LineString<f64> =
            vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 }].into();
        let mut collection =
            collection_with(geo::Geometry::Polygon(geo::Polygon::new(tiny, vec![])));

        let notes = condition(&mut collection, &ConditionOptions::default());
        assert!(notes.iter().any(|n| n.contains("Dropped 1")));
        assert!(collection.features[0].geometry.is_none());
    }

    #[test]
    fn bowtie_polygon_gets_buffer_fix() {
        // Self-intersecting "bowtie": structurally fine, topologically not.
        let bowtie: geo::LineString<f64> = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 4.0, y: 4.0 },
            coord! { x: 4.0, y: 0.0 },
            coord! { x: 0.0, y: 4.0 },
            coord! { x: 0.0, y: 0.0 },
        ]
        .into();
        let mut collection =
            collection_with(geo::Geometry::Polygon(geo::Polygon::new(bowtie, vec![])));

        let notes = condition(&mut collection, &ConditionOptions::default());
        assert!(notes.iter().any(|n| n.contains("buffer")));
    }

    #[test]
    fn simplification_reduces_vertices_and_notes() {
        let coords: Vec<geo::Coord<f64>> =
            (0..100).map(|i| coord! { x: i as f64 * 0.1, y: (i % 2) as f64 * 0.001 }).collect();
        let mut collection = collection_with(geo::Geometry::LineString(coords.into()));
        let before = match &collection.features[0].geometry {
            Some(geo::Geometry::LineString(line)) => line.0.len(),
            _ => unreachable!(),
        };

        let options = ConditionOptions {
            simplify_tolerance: Some(0.01),
            ..Default::default()
        };
        let notes = condition(&mut collection, &options);
        assert!(notes.contains(&"Simplified (tol=0.01).".to_string()));

        let after = match &collection.features[0].geometry {
            Some(geo::Geometry::LineString(line)) => line.0.len(),
            _ => unreachable!(),
        };
        assert!(after < before);
    }

    #[test]
    fn bad_tolerance_becomes_a_stage_note() {
        let mut collection = collection_with(geo::Geometry::Point(geo::Point::new(0.0, 0.0)));
        let options = ConditionOptions {
            simplify_tolerance: Some(-1.0),
            ..Default::default()
        };
        let notes = condition(&mut collection, &options);
        assert!(notes.iter().any(|n| n.starts_with("Simplification failed:")));
    }

    #[test]
    fn enabled_stages_note_even_on_clean_input() {
        let mut collection = collection_with(geo::Geometry::Point(geo::Point::new(1.0, 2.0)));
        let notes = condition(&mut collection, &ConditionOptions::default());

        assert!(notes.contains(&"Applied validity repair.".to_string()));
        assert!(notes.contains(&"Applied zero-width buffer fix.".to_string()));
        assert!(matches!(
            collection.features[0].geometry,
            Some(geo::Geometry::Point(_))
        ));
    }

    #[test]
    fn disabled_stages_stay_silent() {
        let mut collection = collection_with(geo::Geometry::Point(geo::Point::new(1.0, 2.0)));
        let options = ConditionOptions {
            fix_invalid: false,
            buffer_fallback: false,
            simplify_tolerance: None,
        };
        assert!(condition(&mut collection, &options).is_empty());
    }

    #[test]
    fn zero_tolerance_skips_simplification() {
        let mut collection = collection_with(geo::Geometry::Point(geo::Point::new(1.0, 2.0)));
        let options = ConditionOptions {
            simplify_tolerance: Some(0.0),
            ..Default::default()
        };
        let notes = condition(&mut collection, &options);
        assert!(notes.iter().all(|n| !n.contains("Simpli")));
    }
}

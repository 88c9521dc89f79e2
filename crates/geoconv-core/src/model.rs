//! In-memory feature collection model
//!
//! A [`FeatureCollection`] is the unit of conversion: an ordered sequence of
//! features sharing one attribute schema and one coordinate reference system.
//! The CRS may be unknown (`None`), in which case reprojection must refuse
//! rather than guess.

use geo::{BoundingRect, Geometry, Rect};
use serde_json::Value;
use std::collections::HashMap;

/// One geometry plus its attributes.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>) -> Self {
        Self { geometry, properties: HashMap::new() }
    }
}

/// An ordered sequence of features with a shared schema and CRS.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    /// Layer name, usually the source file stem.
    pub name: String,

    /// EPSG code of the collection CRS, or `None` when unknown.
    pub crs: Option<u32>,

    /// Attribute names in column order, shared by every feature.
    pub schema: Vec<String>,

    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(name: impl Into<String>, crs: Option<u32>) -> Self {
        Self { name: name.into(), crs, schema: Vec::new(), features: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Append a feature, extending the schema with any attribute names not
    /// seen before (in insertion order).
    pub fn push(&mut self, feature: Feature) {
        for key in feature.properties.keys() {
            if !self.schema.iter().any(|s| s == key) {
                self.schema.push(key.clone());
            }
        }
        self.features.push(feature);
    }

    /// Rename an attribute across the schema and every feature.
    pub fn rename_property(&mut self, from: &str, to: &str) {
        if let Some(slot) = self.schema.iter_mut().find(|s| *s == from) {
            *slot = to.to_string();
        }
        for feature in &mut self.features {
            if let Some(value) = feature.properties.remove(from) {
                feature.properties.insert(to.to_string(), value);
            }
        }
    }

    /// The most common geometry type name, for layer summaries.
    pub fn dominant_geometry_type(&self) -> Option<&'static str> {
        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        for feature in &self.features {
            if let Some(geom) = &feature.geometry {
                *counts.entry(geometry_type_name(geom)).or_insert(0) += 1;
            }
        }
        counts.into_iter().max_by_key(|(_, n)| *n).map(|(name, _)| name)
    }

    /// Axis-aligned bounds over all geometries, `None` for empty collections.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let mut merged: Option<Rect<f64>> = None;
        for feature in &self.features {
            let Some(geom) = &feature.geometry else { continue };
            let Some(rect) = geom.bounding_rect() else { continue };
            merged = Some(match merged {
                None => rect,
                Some(acc) => Rect::new(
                    geo::coord! {
                        x: acc.min().x.min(rect.min().x),
                        y: acc.min().y.min(rect.min().y),
                    },
                    geo::coord! {
                        x: acc.max().x.max(rect.max().x),
                        y: acc.max().y.max(rect.max().y),
                    },
                ),
            });
        }
        merged
    }

    /// Human-readable CRS label for report lines.
    pub fn crs_label(&self) -> String {
        match self.crs {
            Some(code) => format!("EPSG:{code}"),
            None => "unknown".to_string(),
        }
    }
}

/// Geometry type name as used in layer summaries and format metadata.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

//! Basic GML reader
//!
//! A pragmatic subset of GML: Point, LineString and Polygon geometries with
//! coordinates in `posList`, `pos` or legacy `coordinates` elements. The CRS
//! is taken from the first `srsName` attribute encountered; coordinate order
//! is assumed x,y. Application-schema attributes are not extracted.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{epsg_from_identifier, geojson::layer_name, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct GmlReader;

impl FormatReader for GmlReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let content = fs::read_to_string(path)?;
        let mut parser = Parser::new();
        parser.run(&content).map_err(|reason| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason,
        })?;

        let mut collection = FeatureCollection::new(layer_name(path), parser.crs);
        for geometry in parser.geometries {
            collection.push(Feature::new(Some(geometry)));
        }
        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["gml"]
    }

    fn format_name(&self) -> &str {
        "GML"
    }
}

#[derive(Clone, Copy, PartialEq)]
enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

#[derive(Clone, Copy, PartialEq)]
enum RingRole {
    Exterior,
    Interior,
}

struct Parser {
    crs: Option<u32>,
    geometries: Vec<geo::Geometry<f64>>,
    current: Option<GeometryKind>,
    ring_role: RingRole,
    in_coords: bool,
    legacy_coords: bool,
    coords: Vec<geo::Coord<f64>>,
    exterior: Option<geo::LineString<f64>>,
    interiors: Vec<geo::LineString<f64>>,
}

impl Parser {
    fn new() -> Self {
        Self {
            crs: None,
            geometries: Vec::new(),
            current: None,
            ring_role: RingRole::Exterior,
            in_coords: false,
            legacy_coords: false,
            coords: Vec::new(),
            exterior: None,
            interiors: Vec::new(),
        }
    }

    fn run(&mut self, content: &str) -> std::result::Result<(), String> {
        let mut reader = XmlReader::from_str(content);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.capture_srs(&e);
                    self.on_start(&name);
                }
                Ok(Event::Text(t)) if self.in_coords => {
                    let text = t.unescape().map_err(|e| format!("bad coordinate text: {e}"))?;
                    self.on_coordinates(&text)?;
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.on_end(&name);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(format!("malformed XML: {e}")),
            }
        }
        Ok(())
    }

    fn capture_srs(&mut self, e: &quick_xml::events::BytesStart<'_>) {
        if self.crs.is_some() {
            return;
        }
        for attr in e.attributes().flatten() {
            if attr.key.local_name().as_ref() == b"srsName" {
                if let Ok(value) = attr.unescape_value() {
                    self.crs = epsg_from_identifier(&value);
                }
            }
        }
    }

    fn on_start(&mut self, name: &str) {
        match name {
            "Point" => self.begin(GeometryKind::Point),
            "LineString" => self.begin(GeometryKind::LineString),
            "Polygon" => self.begin(GeometryKind::Polygon),
            "exterior" | "outerBoundaryIs" => self.ring_role = RingRole::Exterior,
            "interior" | "innerBoundaryIs" => self.ring_role = RingRole::Interior,
            "posList" | "pos" if self.current.is_some() => {
                self.in_coords = true;
                self.legacy_coords = false;
            }
            "coordinates" if self.current.is_some() => {
                self.in_coords = true;
                self.legacy_coords = true;
            }
            _ => {}
        }
    }

    fn begin(&mut self, kind: GeometryKind) {
        self.current = Some(kind);
        self.ring_role = RingRole::Exterior;
        self.coords.clear();
        self.exterior = None;
        self.interiors.clear();
    }

    fn on_coordinates(&mut self, text: &str) -> std::result::Result<(), String> {
        let parsed = if self.legacy_coords {
            parse_legacy_coordinates(text)?
        } else {
            parse_pos_list(text)?
        };
        self.coords.extend(parsed);
        Ok(())
    }

    fn on_end(&mut self, name: &str) {
        match name {
            "posList" | "pos" | "coordinates" => self.in_coords = false,
            "LinearRing" => {
                let ring: geo::LineString<f64> = std::mem::take(&mut self.coords).into();
                match self.ring_role {
                    RingRole::Exterior => self.exterior = Some(ring),
                    RingRole::Interior => self.interiors.push(ring),
                }
            }
            "Point" => {
                if let Some(coord) = self.coords.first().copied() {
                    self.geometries.push(geo::Geometry::Point(coord.into()));
                }
                self.current = None;
            }
            "LineString" => {
                if !self.coords.is_empty() {
                    let line: geo::LineString<f64> = std::mem::take(&mut self.coords).into();
                    self.geometries.push(geo::Geometry::LineString(line));
                }
                self.current = None;
            }
            "Polygon" => {
                if let Some(exterior) = self.exterior.take() {
                    self.geometries.push(geo::Geometry::Polygon(geo::Polygon::new(
                        exterior,
                        std::mem::take(&mut self.interiors),
                    )));
                }
                self.current = None;
            }
            _ => {}
        }
    }
}

/// `posList`/`pos` content: whitespace-separated ordinates, x y pairs.
fn parse_pos_list(text: &str) -> std::result::Result<Vec<geo::Coord<f64>>, String> {
    let ordinates: Vec<f64> = text
        .split_whitespace()
        .map(|token| token.parse().map_err(|_| format!("bad ordinate '{token}'")))
        .collect::<std::result::Result<_, _>>()?;
    if ordinates.len() % 2 != 0 {
        return Err("odd number of ordinates in posList".to_string());
    }
    Ok(ordinates
        .chunks_exact(2)
        .map(|pair| geo::coord! { x: pair[0], y: pair[1] })
        .collect())
}

/// Legacy `coordinates` content: `x,y x,y` tuples.
fn parse_legacy_coordinates(text: &str) -> std::result::Result<Vec<geo::Coord<f64>>, String> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let x = parts
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| format!("bad coordinate tuple '{tuple}'"))?;
            let y = parts
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| format!("bad coordinate tuple '{tuple}'"))?;
            Ok(geo::coord! { x: x, y: y })
        })
        .collect()
}

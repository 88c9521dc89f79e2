//! Shapefile format reader
//!
//! Reads ESRI Shapefiles using pure Rust. A shapefile is a bundle of sidecar
//! files (.shp, .shx, .dbf, optionally .prj) addressed by its `.shp` member.
//! The CRS is recovered from the `.prj` WKT when present; a missing or
//! unparseable `.prj` leaves the collection CRS unknown.

use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{PolygonRing, Reader as ShpReader, Shape};
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::{geojson::layer_name, FormatReader};
use crate::model::{Feature, FeatureCollection};

pub struct ShapefileReader;

impl FormatReader for ShapefileReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        verify_components(path)?;

        let mut reader = ShpReader::from_path(path).map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to open shapefile: {e}"),
        })?;

        let crs = extract_crs(path);
        let mut collection = FeatureCollection::new(layer_name(path), crs);

        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result.map_err(|e| ConvertError::UnreadableSource {
                path: path.to_path_buf(),
                reason: format!("failed to read feature: {e}"),
            })?;

            let mut feature = Feature::new(shape_to_geometry(shape)?);
            for (name, value) in record {
                feature.properties.insert(name, dbase_to_json(value));
            }
            collection.push(feature);
        }

        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        "Shapefile"
    }
}

/// All required sidecar files must be present before opening.
fn verify_components(path: &Path) -> Result<()> {
    let base = path.with_extension("");
    let missing: Vec<String> = ["shp", "shx", "dbf"]
        .iter()
        .filter(|ext| !base.with_extension(ext).exists())
        .map(|ext| format!(".{ext}"))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("missing shapefile components: {}", missing.join(", ")),
        })
    }
}

/// CRS from the `.prj` sidecar, `None` when absent or unrecognizable.
fn extract_crs(path: &Path) -> Option<u32> {
    let prj_path = path.with_extension("prj");
    let content = fs::read_to_string(prj_path).ok()?;

    // WKT without an AUTHORITY clause or EPSG prefix names no code we can
    // use; the CRS stays unknown rather than guessed.
    epsg_from_wkt(&content)
}

/// Scan WKT for `AUTHORITY["EPSG","<code>"]` or an `EPSG:<code>` prefix.
fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    if let Some(start) = wkt.rfind("AUTHORITY[\"EPSG\",\"") {
        let code_start = start + 18;
        if let Some(end) = wkt[code_start..].find('"') {
            if let Ok(code) = wkt[code_start..code_start + end].parse() {
                return Some(code);
            }
        }
    }

    if let Some(start) = wkt.find("EPSG:") {
        let digits: String =
            wkt[start + 5..].chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    None
}

/// Convert a shapefile shape to a geo geometry. Z and M values are dropped.
fn shape_to_geometry(shape: Shape) -> Result<Option<geo::Geometry<f64>>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointZ(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointM(p) => geo::Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::Polyline(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::PolylineZ(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::PolylineM(line) => parts_to_geometry(line.parts(), |p| (p.x, p.y)),
        Shape::Polygon(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonZ(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonM(polygon) => rings_to_geometry(polygon.rings(), |p| (p.x, p.y)),
        Shape::Multipoint(mp) => points_to_geometry(mp.points(), |p| (p.x, p.y)),
        Shape::MultipointZ(mp) => points_to_geometry(mp.points(), |p| (p.x, p.y)),
        Shape::MultipointM(mp) => points_to_geometry(mp.points(), |p| (p.x, p.y)),
        Shape::Multipatch(_) => {
            return Err(ConvertError::FormatError {
                format: "Shapefile".to_string(),
                message: "Multipatch geometries are not supported".to_string(),
            })
        }
    };
    Ok(Some(geometry))
}

fn parts_to_geometry<P>(parts: &[Vec<P>], xy: fn(&P) -> (f64, f64)) -> geo::Geometry<f64> {
    let lines: Vec<geo::LineString<f64>> = parts
        .iter()
        .map(|part| part.iter().map(|p| coord(xy(p))).collect::<Vec<_>>().into())
        .collect();

    if lines.len() == 1 {
        geo::Geometry::LineString(lines.into_iter().next().unwrap())
    } else {
        geo::Geometry::MultiLineString(geo::MultiLineString::new(lines))
    }
}

/// Shapefile polygons interleave outer and inner rings; each outer ring
/// starts a new polygon, inner rings attach to the most recent outer.
fn rings_to_geometry<P>(rings: &[PolygonRing<P>], xy: fn(&P) -> (f64, f64)) -> geo::Geometry<f64> {
    let mut polygons: Vec<geo::Polygon<f64>> = Vec::new();

    for ring in rings {
        let line: geo::LineString<f64> =
            ring.points().iter().map(|p| coord(xy(p))).collect::<Vec<_>>().into();
        match ring {
            PolygonRing::Outer(_) => polygons.push(geo::Polygon::new(line, vec![])),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line),
                // Inner ring before any outer ring; promote it.
                None => polygons.push(geo::Polygon::new(line, vec![])),
            },
        }
    }

    if polygons.len() == 1 {
        geo::Geometry::Polygon(polygons.into_iter().next().unwrap())
    } else {
        geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons))
    }
}

fn points_to_geometry<P>(points: &[P], xy: fn(&P) -> (f64, f64)) -> geo::Geometry<f64> {
    geo::Geometry::MultiPoint(
        points.iter().map(|p| geo::Point::from(coord(xy(p)))).collect(),
    )
}

fn coord((x, y): (f64, f64)) -> geo::Coord<f64> {
    geo::coord! { x: x, y: y }
}

/// Map dBase field values onto attribute scalars.
fn dbase_to_json(value: DbaseFieldValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        DbaseFieldValue::Character(Some(s)) => Value::String(s),
        DbaseFieldValue::Character(None) => Value::Null,
        DbaseFieldValue::Numeric(Some(n)) => number(n),
        DbaseFieldValue::Numeric(None) => Value::Null,
        DbaseFieldValue::Logical(Some(b)) => Value::Bool(b),
        DbaseFieldValue::Logical(None) => Value::Null,
        DbaseFieldValue::Date(Some(date)) => Value::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        DbaseFieldValue::Date(None) => Value::Null,
        DbaseFieldValue::Float(Some(f)) => number(f as f64),
        DbaseFieldValue::Float(None) => Value::Null,
        DbaseFieldValue::Integer(i) => Value::Number(i.into()),
        DbaseFieldValue::Currency(c) => number(c),
        DbaseFieldValue::Double(d) => number(d),
        DbaseFieldValue::DateTime(dt) => Value::String(format!(
            "{:04}-{:02}-{:02}",
            dt.date().year(),
            dt.date().month(),
            dt.date().day()
        )),
        DbaseFieldValue::Memo(s) => Value::String(s),
    }
}

fn number(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

//! Shapefile export
//!
//! Stages the .shp/.shx/.dbf (and .prj when the CRS is WGS84) sidecar files
//! in the scratch directory, then bundles them into a single zip artifact.
//! dBase caps attribute names at 10 characters, so longer names are always
//! truncated; with `rename_long_fields` enabled each rename is surfaced as a
//! report note.

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Multipoint, Point as ShpPoint, Polygon as ShpPolygon, PolygonRing, Polyline};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::export::{ExportArtifact, ExportOptions, FormatWriter};
use crate::model::{Feature, FeatureCollection};
use crate::registry::OutputFormat;

const DBASE_NAME_LIMIT: usize = 10;

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

pub struct ShapefileWriter;

impl FormatWriter for ShapefileWriter {
    fn write(
        &self,
        collection: &FeatureCollection,
        base: &str,
        scratch: &Path,
        options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let mut notes = Vec::new();

        let fields = plan_fields(collection, options, &mut notes);
        let class = ShapeClass::for_collection(collection)?;

        let stage = scratch.join("shp_out");
        fs::create_dir_all(&stage)?;
        let shp_path = stage.join(format!("{base}.shp"));

        let mut builder = TableWriterBuilder::new();
        for field in &fields {
            let name = field_name(&field.out_name)?;
            builder = match field.kind {
                FieldKind::Character => builder.add_character_field(name, 254),
                FieldKind::Numeric => builder.add_numeric_field(name, 20, 8),
                FieldKind::Logical => builder.add_logical_field(name),
            };
        }

        let mut writer = shapefile::Writer::from_path(&shp_path, builder).map_err(|e| {
            ConvertError::FormatError {
                format: "Shapefile".to_string(),
                message: format!("failed to create shapefile: {e}"),
            }
        })?;

        let mut skipped = 0usize;
        for feature in &collection.features {
            let record = build_record(feature, &fields);
            let written = match class {
                ShapeClass::Point => match feature.geometry.as_ref().and_then(to_point) {
                    Some(shape) => {
                        write_shape(&mut writer, &shape, &record)?;
                        true
                    }
                    None => false,
                },
                ShapeClass::Multipoint => match feature.geometry.as_ref().and_then(to_multipoint) {
                    Some(shape) => {
                        write_shape(&mut writer, &shape, &record)?;
                        true
                    }
                    None => false,
                },
                ShapeClass::Polyline => match feature.geometry.as_ref().and_then(to_polyline) {
                    Some(shape) => {
                        write_shape(&mut writer, &shape, &record)?;
                        true
                    }
                    None => false,
                },
                ShapeClass::Polygon => match feature.geometry.as_ref().and_then(to_polygon) {
                    Some(shape) => {
                        write_shape(&mut writer, &shape, &record)?;
                        true
                    }
                    None => false,
                },
            };
            if !written {
                skipped += 1;
            }
        }
        drop(writer);

        if skipped > 0 {
            notes.push(format!(
                "Skipped {skipped} feature(s) whose geometry does not fit the {} layer type.",
                class.label()
            ));
        }

        // A .prj is only written when we can state the CRS as WKT.
        if collection.crs == Some(4326) {
            fs::write(stage.join(format!("{base}.prj")), WGS84_WKT)?;
        }

        let bytes = zip_directory(&stage)?;
        let mut artifact = ExportArtifact::new(bytes, format!("{base}.zip"));
        artifact.notes = notes;
        Ok(artifact)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Shapefile
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ShapeClass {
    Point,
    Multipoint,
    Polyline,
    Polygon,
}

impl ShapeClass {
    fn for_collection(collection: &FeatureCollection) -> Result<Self> {
        match collection.dominant_geometry_type() {
            None | Some("Point") => Ok(ShapeClass::Point),
            Some("MultiPoint") => Ok(ShapeClass::Multipoint),
            Some("LineString") | Some("MultiLineString") => Ok(ShapeClass::Polyline),
            Some("Polygon") | Some("MultiPolygon") => Ok(ShapeClass::Polygon),
            Some(other) => Err(ConvertError::FormatError {
                format: "Shapefile".to_string(),
                message: format!(
                    "{other} geometries cannot be written to a shapefile; \
                     try GeoJSON or GeoPackage"
                ),
            }),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ShapeClass::Point => "point",
            ShapeClass::Multipoint => "multipoint",
            ShapeClass::Polyline => "polyline",
            ShapeClass::Polygon => "polygon",
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FieldKind {
    Character,
    Numeric,
    Logical,
}

struct FieldPlan {
    source: String,
    out_name: String,
    kind: FieldKind,
}

/// Truncate field names to the dBase limit, dedupe collisions, and scan
/// values to pick a dBase column type per field.
fn plan_fields(
    collection: &FeatureCollection,
    options: &ExportOptions,
    notes: &mut Vec<String>,
) -> Vec<FieldPlan> {
    let mut taken: Vec<String> = Vec::new();
    let mut fields = Vec::new();

    for source in &collection.schema {
        let mut out_name = truncate_name(source);
        let mut counter = 1;
        while taken.iter().any(|t| t.eq_ignore_ascii_case(&out_name)) {
            out_name = dedupe_name(source, counter);
            counter += 1;
        }
        taken.push(out_name.clone());

        if options.rename_long_fields && out_name != *source {
            notes.push(format!("Field '{source}' -> '{out_name}' (Shapefile 10-char limit)"));
        }

        fields.push(FieldPlan {
            source: source.clone(),
            out_name,
            kind: scan_kind(collection, source),
        });
    }
    fields
}

pub(crate) fn truncate_name(name: &str) -> String {
    name.chars().take(DBASE_NAME_LIMIT).collect()
}

fn dedupe_name(source: &str, counter: usize) -> String {
    let suffix = format!("_{counter}");
    let keep = DBASE_NAME_LIMIT.saturating_sub(suffix.len());
    let mut name: String = source.chars().take(keep).collect();
    name.push_str(&suffix);
    name
}

fn scan_kind(collection: &FeatureCollection, column: &str) -> FieldKind {
    let mut saw_value = false;
    let mut all_bool = true;
    let mut all_number = true;

    for feature in &collection.features {
        match feature.properties.get(column) {
            None | Some(serde_json::Value::Null) => {}
            Some(serde_json::Value::Bool(_)) => {
                saw_value = true;
                all_number = false;
            }
            Some(serde_json::Value::Number(_)) => {
                saw_value = true;
                all_bool = false;
            }
            Some(_) => {
                saw_value = true;
                all_bool = false;
                all_number = false;
            }
        }
    }

    if !saw_value {
        FieldKind::Character
    } else if all_bool {
        FieldKind::Logical
    } else if all_number {
        FieldKind::Numeric
    } else {
        FieldKind::Character
    }
}

fn field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|e| ConvertError::FormatError {
        format: "Shapefile".to_string(),
        message: format!("invalid dBase field name '{name}': {e}"),
    })
}

fn build_record(feature: &Feature, fields: &[FieldPlan]) -> Record {
    let mut record = Record::default();
    for field in fields {
        let value = feature.properties.get(&field.source);
        let field_value = match field.kind {
            FieldKind::Logical => FieldValue::Logical(value.and_then(|v| v.as_bool())),
            FieldKind::Numeric => FieldValue::Numeric(value.and_then(|v| v.as_f64())),
            FieldKind::Character => FieldValue::Character(match value {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            }),
        };
        record.insert(field.out_name.clone(), field_value);
    }
    record
}

fn write_shape<S: shapefile::record::EsriShape>(
    writer: &mut shapefile::Writer<std::io::BufWriter<fs::File>>,
    shape: &S,
    record: &Record,
) -> Result<()> {
    writer.write_shape_and_record(shape, record).map_err(|e| ConvertError::FormatError {
        format: "Shapefile".to_string(),
        message: format!("failed to write feature: {e}"),
    })
}

fn to_point(geometry: &geo::Geometry<f64>) -> Option<ShpPoint> {
    match geometry {
        geo::Geometry::Point(p) => Some(ShpPoint::new(p.x(), p.y())),
        _ => None,
    }
}

fn to_multipoint(geometry: &geo::Geometry<f64>) -> Option<Multipoint> {
    match geometry {
        geo::Geometry::MultiPoint(mp) => Some(Multipoint::new(
            mp.iter().map(|p| ShpPoint::new(p.x(), p.y())).collect(),
        )),
        geo::Geometry::Point(p) => Some(Multipoint::new(vec![ShpPoint::new(p.x(), p.y())])),
        _ => None,
    }
}

fn to_polyline(geometry: &geo::Geometry<f64>) -> Option<Polyline> {
    let parts: Vec<Vec<ShpPoint>> = match geometry {
        geo::Geometry::LineString(line) => vec![line_part(line)],
        geo::Geometry::MultiLineString(lines) => lines.iter().map(line_part).collect(),
        _ => return None,
    };
    Some(Polyline::with_parts(parts))
}

fn to_polygon(geometry: &geo::Geometry<f64>) -> Option<ShpPolygon> {
    let rings: Vec<PolygonRing<ShpPoint>> = match geometry {
        geo::Geometry::Polygon(polygon) => polygon_rings(polygon),
        geo::Geometry::MultiPolygon(polygons) => {
            polygons.iter().flat_map(polygon_rings).collect()
        }
        _ => return None,
    };
    Some(ShpPolygon::with_rings(rings))
}

fn polygon_rings(polygon: &geo::Polygon<f64>) -> Vec<PolygonRing<ShpPoint>> {
    let mut rings = vec![PolygonRing::Outer(line_part(polygon.exterior()))];
    for interior in polygon.interiors() {
        rings.push(PolygonRing::Inner(line_part(interior)));
    }
    rings
}

fn line_part(line: &geo::LineString<f64>) -> Vec<ShpPoint> {
    line.coords().map(|c| ShpPoint::new(c.x, c.y)).collect()
}

/// Zip every file in `dir` (flat, no subdirectories expected) into memory.
fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let zip_options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            zip.start_file(name, zip_options).map_err(zip_error)?;
            zip.write_all(&fs::read(&path)?)?;
        }
        zip.finish().map_err(zip_error)?;
    }
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> ConvertError {
    ConvertError::Serialization(format!("zip packaging failed: {e}"))
}

//! GeoPackage format reader
//!
//! Opens the SQLite container, picks the first `features` layer recorded in
//! `gpkg_contents`, and decodes GeoPackage binary geometry blobs (a fixed
//! header followed by WKB). Attribute columns come across as-is.

use geozero::wkb::Wkb;
use geozero::ToGeo;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::FormatReader;
use crate::model::{Feature, FeatureCollection};

pub struct GeoPackageReader;

impl FormatReader for GeoPackageReader {
    fn read(&self, path: &Path) -> Result<FeatureCollection> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| unreadable(path, format!("failed to open GeoPackage: {e}")))?;

        let (table, geometry_column, srs_id) = feature_layer(&conn, path)?;
        let crs = match srs_id {
            // 0 (undefined geographic) and -1 (undefined cartesian) are the
            // GeoPackage placeholders for "no CRS".
            0 | -1 => None,
            id => u32::try_from(id).ok(),
        };

        let mut collection = FeatureCollection::new(table.clone(), crs);

        let sql = format!("SELECT * FROM \"{table}\"");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| unreadable(path, format!("failed to query layer '{table}': {e}")))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query([])
            .map_err(|e| unreadable(path, format!("failed to query layer '{table}': {e}")))?;

        while let Some(row) = rows
            .next()
            .map_err(|e| unreadable(path, format!("failed to read row: {e}")))?
        {
            let mut feature = Feature::new(None);
            for (idx, column) in column_names.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| unreadable(path, format!("failed to read column: {e}")))?;
                if column == &geometry_column {
                    if let ValueRef::Blob(blob) = value {
                        feature.geometry = decode_gpb(blob)?;
                    }
                } else {
                    feature.properties.insert(column.clone(), sqlite_to_json(value));
                }
            }
            collection.push(feature);
        }

        Ok(collection)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["gpkg"]
    }

    fn format_name(&self) -> &str {
        "GeoPackage"
    }
}

fn unreadable(path: &Path, reason: String) -> ConvertError {
    ConvertError::UnreadableSource { path: path.to_path_buf(), reason }
}

/// First `features` layer: (table name, geometry column, srs_id).
fn feature_layer(conn: &Connection, path: &Path) -> Result<(String, String, i64)> {
    conn.query_row(
        "SELECT c.table_name, g.column_name, c.srs_id \
         FROM gpkg_contents c \
         JOIN gpkg_geometry_columns g ON g.table_name = c.table_name \
         WHERE c.data_type = 'features' \
         ORDER BY c.table_name LIMIT 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .map_err(|e| unreadable(path, format!("no feature layer found: {e}")))
}

/// Decode a GeoPackage binary geometry blob.
///
/// Layout: magic "GP", version, flags, srs_id (4 bytes), optional envelope,
/// then standard WKB. Envelope length is selected by flags bits 1-3.
fn decode_gpb(blob: &[u8]) -> Result<Option<geo::Geometry<f64>>> {
    if blob.len() < 8 || &blob[0..2] != b"GP" {
        return Err(ConvertError::FormatError {
            format: "GeoPackage".to_string(),
            message: "geometry blob missing GeoPackage binary header".to_string(),
        });
    }

    let flags = blob[3];
    if flags & 0b0001_0000 != 0 {
        // Empty-geometry flag.
        return Ok(None);
    }

    let envelope_len = match (flags >> 1) & 0b0111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => {
            return Err(ConvertError::FormatError {
                format: "GeoPackage".to_string(),
                message: format!("invalid envelope indicator {other} in geometry blob"),
            })
        }
    };

    let wkb_start = 8 + envelope_len;
    if blob.len() <= wkb_start {
        return Err(ConvertError::FormatError {
            format: "GeoPackage".to_string(),
            message: "geometry blob truncated before WKB payload".to_string(),
        });
    }

    let geometry = Wkb(blob[wkb_start..].to_vec()).to_geo().map_err(|e| {
        ConvertError::FormatError {
            format: "GeoPackage".to_string(),
            message: format!("failed to decode WKB geometry: {e}"),
        }
    })?;
    Ok(Some(geometry))
}

fn sqlite_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => {
            serde_json::Value::String(String::from_utf8_lossy(t).into_owned())
        }
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // WKB for POINT(1 2), little endian.
    fn point_wkb() -> Vec<u8> {
        let mut wkb = vec![0x01, 0x01, 0x00, 0x00, 0x00];
        wkb.extend_from_slice(&1.0f64.to_le_bytes());
        wkb.extend_from_slice(&2.0f64.to_le_bytes());
        wkb
    }

    #[test]
    fn decodes_blob_without_envelope() {
        let mut blob = vec![b'G', b'P', 0x00, 0x01, 230, 16, 0, 0];
        blob.extend(point_wkb());

        let geometry = decode_gpb(&blob).unwrap().unwrap();
        match geometry {
            geo::Geometry::Point(p) => {
                assert_eq!(p.x(), 1.0);
                assert_eq!(p.y(), 2.0);
            }
            other => panic!("expected point, got {other:?}"),
        }
    }

    #[test]
    fn decodes_blob_with_xy_envelope() {
        let mut blob = vec![b'G', b'P', 0x00, 0x03, 230, 16, 0, 0];
        blob.extend(std::iter::repeat(0u8).take(32));
        blob.extend(point_wkb());

        assert!(decode_gpb(&blob).unwrap().is_some());
    }

    #[test]
    fn empty_flag_yields_no_geometry() {
        let blob = vec![b'G', b'P', 0x00, 0b0001_0000, 230, 16, 0, 0];
        assert!(decode_gpb(&blob).unwrap().is_none());
    }

    #[test]
    fn rejects_non_gpb_blob() {
        let err = decode_gpb(b"XXnot a geometry").unwrap_err();
        assert!(matches!(err, ConvertError::FormatError { .. }));
    }
}

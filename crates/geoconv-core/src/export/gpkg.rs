//! GeoPackage export
//!
//! Builds the SQLite container in the scratch directory with the mandatory
//! GeoPackage metadata tables, one feature table, and geometries encoded as
//! GeoPackage binary blobs (header + little-endian WKB), then returns the
//! finished file bytes.

use geozero::{CoordDimensions, ToWkb};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::export::{ExportArtifact, ExportOptions, FormatWriter};
use crate::model::FeatureCollection;
use crate::registry::OutputFormat;

pub struct GeoPackageWriter;

impl FormatWriter for GeoPackageWriter {
    fn write(
        &self,
        collection: &FeatureCollection,
        base: &str,
        scratch: &Path,
        _options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let path = scratch.join(format!("{base}.gpkg"));
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let conn = Connection::open(&path).map_err(sqlite_error)?;
        let srs_id: i64 = collection.crs.map(i64::from).unwrap_or(0);

        create_container(&conn, collection, base, srs_id)?;
        insert_features(&conn, collection, base, srs_id)?;
        drop(conn);

        let bytes = fs::read(&path)?;
        Ok(ExportArtifact::new(bytes, format!("{base}.gpkg")))
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Gpkg
    }
}

fn sqlite_error(e: rusqlite::Error) -> ConvertError {
    ConvertError::FormatError { format: "GeoPackage".to_string(), message: e.to_string() }
}

fn create_container(
    conn: &Connection,
    collection: &FeatureCollection,
    table: &str,
    srs_id: i64,
) -> Result<()> {
    // 0x47504B47 is "GPKG"; user_version 10300 marks GeoPackage 1.3.
    conn.execute_batch(
        "PRAGMA application_id = 0x47504B47;
         PRAGMA user_version = 10300;

         CREATE TABLE gpkg_spatial_ref_sys (
             srs_name TEXT NOT NULL,
             srs_id INTEGER PRIMARY KEY,
             organization TEXT NOT NULL,
             organization_coordsys_id INTEGER NOT NULL,
             definition TEXT NOT NULL,
             description TEXT
         );
         INSERT INTO gpkg_spatial_ref_sys VALUES
             ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
             ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL),
             ('WGS 84 geodetic', 4326, 'EPSG', 4326,
              'GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],AUTHORITY[\"EPSG\",\"4326\"]]',
              NULL);

         CREATE TABLE gpkg_contents (
             table_name TEXT NOT NULL PRIMARY KEY,
             data_type TEXT NOT NULL,
             identifier TEXT UNIQUE,
             description TEXT DEFAULT '',
             last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
             min_x DOUBLE, min_y DOUBLE, max_x DOUBLE, max_y DOUBLE,
             srs_id INTEGER,
             CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id)
                 REFERENCES gpkg_spatial_ref_sys(srs_id)
         );

         CREATE TABLE gpkg_geometry_columns (
             table_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL,
             z TINYINT NOT NULL,
             m TINYINT NOT NULL,
             CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
         );",
    )
    .map_err(sqlite_error)?;

    if !matches!(srs_id, -1 | 0 | 4326) {
        conn.execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, 'EPSG', ?2, 'undefined', NULL)",
            rusqlite::params![format!("EPSG:{srs_id}"), srs_id],
        )
        .map_err(sqlite_error)?;
    }

    let bounds = collection.bounds();
    conn.execute(
        "INSERT INTO gpkg_contents
             (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            table,
            bounds.map(|r| r.min().x),
            bounds.map(|r| r.min().y),
            bounds.map(|r| r.max().x),
            bounds.map(|r| r.max().y),
            srs_id,
        ],
    )
    .map_err(sqlite_error)?;

    let geometry_type = collection
        .dominant_geometry_type()
        .map(|t| t.to_ascii_uppercase())
        .unwrap_or_else(|| "GEOMETRY".to_string());
    conn.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
        rusqlite::params![table, geometry_type, srs_id],
    )
    .map_err(sqlite_error)?;

    let columns: String = collection
        .schema
        .iter()
        .map(|name| format!(", \"{name}\" {}", column_type(collection, name)))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE \"{table}\" (
             fid INTEGER PRIMARY KEY AUTOINCREMENT,
             geom BLOB{columns}
         );"
    ))
    .map_err(sqlite_error)?;

    Ok(())
}

fn column_type(collection: &FeatureCollection, column: &str) -> &'static str {
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
    if saw_value && all_bool {
        "BOOLEAN"
    } else if saw_value && all_number {
        "REAL"
    } else {
        "TEXT"
    }
}

fn insert_features(
    conn: &Connection,
    collection: &FeatureCollection,
    table: &str,
    srs_id: i64,
) -> Result<()> {
    let placeholders: String =
        (0..collection.schema.len()).map(|i| format!(", ?{}", i + 2)).collect();
    let column_list: String =
        collection.schema.iter().map(|c| format!(", \"{c}\"")).collect();
    let sql =
        format!("INSERT INTO \"{table}\" (geom{column_list}) VALUES (?1{placeholders})");
    let mut stmt = conn.prepare(&sql).map_err(sqlite_error)?;

    for feature in &collection.features {
        let blob = feature
            .geometry
            .as_ref()
            .map(|g| encode_gpb(g, srs_id))
            .transpose()?;

        let mut params: Vec<rusqlite::types::Value> = vec![match blob {
            Some(bytes) => rusqlite::types::Value::Blob(bytes),
            None => rusqlite::types::Value::Null,
        }];
        for column in &collection.schema {
            params.push(json_to_sqlite(feature.properties.get(column)));
        }
        stmt.execute(rusqlite::params_from_iter(params)).map_err(sqlite_error)?;
    }
    Ok(())
}

/// GeoPackage binary blob: "GP" magic, version 0, little-endian flags, the
/// srs_id, no envelope, then WKB.
fn encode_gpb(geometry: &geo::Geometry<f64>, srs_id: i64) -> Result<Vec<u8>> {
    let wkb = geometry.to_wkb(CoordDimensions::xy()).map_err(|e| {
        ConvertError::FormatError {
            format: "GeoPackage".to_string(),
            message: format!("failed to encode WKB geometry: {e}"),
        }
    })?;

    let mut blob = Vec::with_capacity(8 + wkb.len());
    blob.extend_from_slice(b"GP");
    blob.push(0x00);
    blob.push(0b0000_0001);
    blob.extend_from_slice(&(srs_id as i32).to_le_bytes());
    blob.extend_from_slice(&wkb);
    Ok(blob)
}

fn json_to_sqlite(value: Option<&serde_json::Value>) -> rusqlite::types::Value {
    match value {
        None | Some(serde_json::Value::Null) => rusqlite::types::Value::Null,
        Some(serde_json::Value::Bool(b)) => rusqlite::types::Value::Integer(*b as i64),
        Some(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => rusqlite::types::Value::Integer(i),
            None => rusqlite::types::Value::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Some(serde_json::Value::String(s)) => rusqlite::types::Value::Text(s.clone()),
        Some(other) => rusqlite::types::Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatReader;
    use crate::model::Feature;

    #[test]
    fn written_package_reads_back() {
        let mut collection = FeatureCollection::new("sites", Some(4326));
        let mut feature =
            Feature::new(Some(geo::Geometry::Point(geo::Point::new(77.6, 12.9))));
        feature.properties.insert("name".to_string(), serde_json::json!("A"));
        feature.properties.insert("height".to_string(), serde_json::json!(12.5));
        collection.push(feature);

        let dir = tempfile::tempdir().unwrap();
        let artifact = GeoPackageWriter
            .write(&collection, "sites", dir.path(), &ExportOptions::default())
            .unwrap();
        assert_eq!(artifact.file_name, "sites.gpkg");

        let path = dir.path().join("roundtrip.gpkg");
        fs::write(&path, &artifact.bytes).unwrap();
        let read_back = crate::formats::gpkg::GeoPackageReader.read(&path).unwrap();

        assert_eq!(read_back.crs, Some(4326));
        assert_eq!(read_back.len(), 1);
        assert_eq!(
            read_back.features[0].properties.get("name"),
            Some(&serde_json::json!("A"))
        );
        match &read_back.features[0].geometry {
            Some(geo::Geometry::Point(p)) => {
                assert!((p.x() - 77.6).abs() < 1e-9);
                assert!((p.y() - 12.9).abs() < 1e-9);
            }
            other => panic!("expected point, got {other:?}"),
        }
    }

    #[test]
    fn empty_collection_yields_valid_container() {
        let collection = FeatureCollection::new("empty", None);
        let dir = tempfile::tempdir().unwrap();
        let artifact = GeoPackageWriter
            .write(&collection, "empty", dir.path(), &ExportOptions::default())
            .unwrap();

        let path = dir.path().join("check.gpkg");
        fs::write(&path, &artifact.bytes).unwrap();
        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM gpkg_contents WHERE data_type = 'features'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}

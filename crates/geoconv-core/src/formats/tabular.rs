//! Tabular point ingestion
//!
//! CSV and Excel files become point layers by mapping two columns to
//! longitude and latitude. Rows whose coordinate cells are empty or
//! non-numeric are dropped silently; remaining columns come along as
//! attributes.

use calamine::{open_workbook_auto, Data, Reader as CalamineReader};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::formats::geojson::layer_name;
use crate::model::{Feature, FeatureCollection};
use crate::registry;

/// Column mapping for turning a table into a point layer.
#[derive(Debug, Clone)]
pub struct TabularMapping {
    pub lat_col: String,
    pub lon_col: String,
    /// CRS the coordinate columns are expressed in.
    pub source_epsg: u32,
}

impl TabularMapping {
    pub fn new(lat_col: impl Into<String>, lon_col: impl Into<String>) -> Self {
        Self { lat_col: lat_col.into(), lon_col: lon_col.into(), source_epsg: 4326 }
    }

    pub fn with_epsg(mut self, epsg: u32) -> Self {
        self.source_epsg = epsg;
        self
    }

    /// Guess a lat/lon column pair from headers, by common naming.
    pub fn guess(headers: &[String]) -> Option<Self> {
        let lat = find_column(headers, &["lat", "latitude", "y"])?;
        let lon = find_column(headers, &["lon", "longitude", "lng", "x"])?;
        Some(Self::new(lat, lon))
    }
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        if let Some(header) = headers.iter().find(|h| h.to_ascii_lowercase() == *candidate) {
            return Some(header.clone());
        }
    }
    None
}

/// Read a CSV or XLSX file as a point layer using the given column mapping.
pub fn read_table(path: &Path, mapping: &TabularMapping) -> Result<FeatureCollection> {
    let extension = registry::extension_of(path).unwrap_or_default();
    let (headers, rows) = match extension.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" => read_xlsx(path)?,
        other => {
            return Err(ConvertError::UnreadableSource {
                path: path.to_path_buf(),
                reason: format!("'.{other}' is not a supported tabular extension"),
            })
        }
    };

    let lat_idx = column_index(&headers, &mapping.lat_col)?;
    let lon_idx = column_index(&headers, &mapping.lon_col)?;

    let mut collection = FeatureCollection::new(layer_name(path), Some(mapping.source_epsg));

    for row in rows {
        let (Some(lat), Some(lon)) = (
            row.get(lat_idx).and_then(|c| cell_as_f64(c)),
            row.get(lon_idx).and_then(|c| cell_as_f64(c)),
        ) else {
            // Unmappable row, dropped without a note.
            continue;
        };

        let mut feature =
            Feature::new(Some(geo::Geometry::Point(geo::Point::new(lon, lat))));
        for (idx, header) in headers.iter().enumerate() {
            if idx == lat_idx || idx == lon_idx {
                continue;
            }
            let value = row.get(idx).map(cell_to_json).unwrap_or(serde_json::Value::Null);
            feature.properties.insert(header.clone(), value);
        }
        collection.push(feature);
    }

    Ok(collection)
}

/// Header row of a CSV or XLSX file, for column-mapping prompts.
pub fn headers(path: &Path) -> Result<Vec<String>> {
    let extension = registry::extension_of(path).unwrap_or_default();
    match extension.as_str() {
        "csv" => read_csv(path).map(|(headers, _)| headers),
        "xlsx" => read_xlsx(path).map(|(headers, _)| headers),
        other => Err(ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("'.{other}' is not a supported tabular extension"),
        }),
    }
}

fn column_index(headers: &[String], column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| ConvertError::SchemaError { column: column.to_string() })
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to open CSV: {e}"),
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to read CSV header: {e}"),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to read CSV row: {e}"),
        })?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok((headers, rows))
}

fn read_xlsx(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ConvertError::UnreadableSource {
        path: path.to_path_buf(),
        reason: format!("failed to open workbook: {e}"),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: "workbook has no sheets".to_string(),
        })?
        .map_err(|e| ConvertError::UnreadableSource {
            path: path.to_path_buf(),
            reason: format!("failed to read first sheet: {e}"),
        })?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|row| row.iter().map(|c| data_to_string(c).trim().to_string()).collect())
        .unwrap_or_default();

    let rows: Vec<Vec<String>> = rows_iter
        .map(|row| row.iter().map(data_to_string).collect())
        .collect();
    Ok((headers, rows))
}

fn data_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            // Keep integral floats free of a trailing ".0".
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn cell_as_f64(cell: &String) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    // "NaN" and "inf" parse as f64 but are not coordinates.
    trimmed.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Attribute cells keep numbers as numbers; everything else is a string.
fn cell_to_json(cell: &String) -> serde_json::Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(number);
        }
    }
    serde_json::Value::String(trimmed.to_string())
}

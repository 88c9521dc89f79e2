//! Export writers
//!
//! Each output format implements [`FormatWriter`]; [`export`] dispatches on
//! the requested [`OutputFormat`] and returns a finished [`ExportArtifact`]
//! holding the serialized bytes plus any notes the writer wants surfaced in
//! the conversion report (field renames, relabels, remediation hints).

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::model::FeatureCollection;
use crate::registry::OutputFormat;

pub mod geojson;
pub mod gpkg;
pub mod gpx;
pub mod kml;
pub mod shapefile;

/// A finished export: bytes to hand to the caller plus report notes.
#[derive(Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub notes: Vec<String>,
}

impl ExportArtifact {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self { bytes, file_name: file_name.into(), notes: Vec::new() }
    }
}

/// Export behavior toggles.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Truncate attribute names beyond the 10-character dBase limit and
    /// report each rename. The truncation itself always happens for
    /// shapefile output; this controls whether renames are surfaced.
    pub rename_long_fields: bool,
    /// Stamp KML output as WGS84 even when the collection CRS says
    /// otherwise. Off by default; when applied a note is emitted.
    pub force_wgs84_label: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { rename_long_fields: true, force_wgs84_label: false }
    }
}

/// Writer trait implemented once per output format.
pub trait FormatWriter {
    fn write(
        &self,
        collection: &FeatureCollection,
        base: &str,
        scratch: &Path,
        options: &ExportOptions,
    ) -> Result<ExportArtifact>;

    fn format(&self) -> OutputFormat;
}

fn writer_for(format: OutputFormat) -> Box<dyn FormatWriter> {
    match format {
        OutputFormat::GeoJson => Box::new(geojson::GeoJsonWriter),
        OutputFormat::Shapefile => Box::new(shapefile::ShapefileWriter),
        OutputFormat::Kml => Box::new(kml::KmlWriter),
        OutputFormat::Gpkg => Box::new(gpkg::GeoPackageWriter),
        OutputFormat::Gpx => Box::new(gpx::GpxWriter),
    }
}

/// Serialize a collection into the requested format.
///
/// `base` is the output file stem; `scratch` is a per-job directory for
/// writers that have to stage sidecar files on disk.
pub fn export(
    collection: &FeatureCollection,
    format: OutputFormat,
    base: &str,
    scratch: &Path,
    options: &ExportOptions,
) -> Result<ExportArtifact> {
    debug!(format = %format, features = collection.len(), "exporting");
    writer_for(format).write(collection, base, scratch, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_has_a_writer() {
        for format in OutputFormat::ALL {
            assert_eq!(writer_for(format).format(), format);
        }
    }
}

//! Format readers
//!
//! Each supported vector format implements [`FormatReader`]; the
//! [`ReaderRegistry`] dispatches on file extension. [`read_collection`] is
//! the single ingestion entry point: it unpacks zipped shapefile bundles
//! into the caller's scratch directory, routes tabular files through the
//! lat/lon column mapping, and hands everything else to a registered reader.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::FeatureCollection;
use crate::registry;

pub mod dxf;
pub mod geojson;
pub mod gml;
pub mod gpkg;
pub mod gpx;
pub mod kml;
pub mod shapefile;
pub mod tabular;

pub use tabular::TabularMapping;

/// Reader trait implemented once per vector format.
pub trait FormatReader: Send + Sync {
    /// Read a feature collection from the given path.
    fn read(&self, path: &Path) -> Result<FeatureCollection>;

    /// Supported file extensions, lowercase, without the leading dot.
    fn supported_extensions(&self) -> &[&str];

    /// Human-readable format name (e.g. "Shapefile", "GeoJSON").
    fn format_name(&self) -> &str;
}

/// Registry of format readers, dispatching on file extension.
pub struct ReaderRegistry {
    readers: Vec<Box<dyn FormatReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with every built-in vector reader registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(geojson::GeoJsonReader));
        registry.register(Box::new(shapefile::ShapefileReader));
        registry.register(Box::new(kml::KmlReader));
        registry.register(Box::new(gpx::GpxReader));
        registry.register(Box::new(gpkg::GeoPackageReader));
        registry.register(Box::new(gml::GmlReader));
        registry.register(Box::new(dxf::DxfReader));
        registry
    }

    pub fn register(&mut self, reader: Box<dyn FormatReader>) {
        self.readers.push(reader);
    }

    pub fn detect(&self, path: &Path) -> Option<&dyn FormatReader> {
        let extension = registry::extension_of(path)?;
        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Ingestion entry point.
///
/// `scratch` must be a per-job directory: zipped shapefile bundles are
/// unpacked beneath it and the extracted files are read in place. Tabular
/// inputs (.csv/.xlsx) require a [`TabularMapping`]; everything else is
/// dispatched to the reader registered for the extension.
pub fn read_collection(
    path: &Path,
    scratch: &Path,
    tabular: Option<&TabularMapping>,
) -> Result<FeatureCollection> {
    let extension = registry::extension_of(path).unwrap_or_default();

    if extension == "zip" {
        let shp = unpack_shapefile_bundle(path, scratch)?;
        debug!(payload = %shp.display(), "unpacked shapefile bundle");
        return shapefile::ShapefileReader.read(&shp);
    }

    if registry::is_tabular(&extension) {
        let mapping = tabular.ok_or_else(|| ConvertError::FormatError {
            format: "Tabular".to_string(),
            message: "lat/lon column mapping required for CSV/XLSX input".to_string(),
        })?;
        return tabular::read_table(path, mapping);
    }

    let registry = ReaderRegistry::standard();
    let reader = registry.detect(path).ok_or_else(|| ConvertError::UnreadableSource {
        path: path.to_path_buf(),
        reason: format!(
            "unsupported input extension '.{extension}' (supported: {})",
            registry.supported_extensions().join(", ")
        ),
    })?;
    debug!(format = reader.format_name(), path = %path.display(), "reading");
    reader.read(path)
}

/// Extract a zipped shapefile bundle and locate its first `.shp` payload.
fn unpack_shapefile_bundle(archive: &Path, scratch: &Path) -> Result<PathBuf> {
    let target = scratch.join("unzipped");
    fs::create_dir_all(&target)?;

    let file = fs::File::open(archive)?;
    let mut zip = ::zip::ZipArchive::new(file).map_err(|e| ConvertError::UnreadableSource {
        path: archive.to_path_buf(),
        reason: format!("not a readable zip archive: {e}"),
    })?;
    zip.extract(&target).map_err(|e| ConvertError::UnreadableSource {
        path: archive.to_path_buf(),
        reason: format!("failed to extract zip archive: {e}"),
    })?;

    find_payload(&target, "shp")?.ok_or_else(|| ConvertError::MissingPayload {
        archive: archive.to_path_buf(),
    })
}

/// Recursive search for the first file with the given extension.
fn find_payload(dir: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if registry::extension_of(&path).as_deref() == Some(extension) {
            return Ok(Some(path));
        }
    }
    for subdir in subdirs {
        if let Some(found) = find_payload(&subdir, extension)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Parse an EPSG code out of a CRS identifier such as `EPSG:4326` or
/// `urn:ogc:def:crs:EPSG::4326`.
pub(crate) fn epsg_from_identifier(name: &str) -> Option<u32> {
    name.rsplit(':').next().and_then(|code| code.trim().parse().ok())
}

//! Static format registry
//!
//! Maps file extensions to human-readable labels for inputs, and defines the
//! set of output formats with their keys and file extensions.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConvertError;

/// Vector input extensions and their labels.
pub const VECTOR_INPUTS: &[(&str, &str)] = &[
    ("zip", "ESRI Shapefile (zipped)"),
    ("geojson", "GeoJSON"),
    ("json", "GeoJSON"),
    ("kml", "KML"),
    ("gpkg", "GeoPackage"),
    ("gml", "GML (basic)"),
    ("gpx", "GPX"),
    ("dxf", "DXF (CAD basic)"),
];

/// Tabular input extensions and their labels.
pub const TABULAR_INPUTS: &[(&str, &str)] = &[("csv", "CSV"), ("xlsx", "Excel")];

/// Label for a supported input extension (without the leading dot).
pub fn input_label(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    VECTOR_INPUTS
        .iter()
        .chain(TABULAR_INPUTS.iter())
        .find(|(ext, _)| *ext == extension)
        .map(|(_, label)| *label)
}

pub fn is_supported_input(extension: &str) -> bool {
    input_label(extension).is_some()
}

/// Whether the extension is a tabular input needing a lat/lon column mapping.
pub fn is_tabular(extension: &str) -> bool {
    let extension = extension.to_ascii_lowercase();
    TABULAR_INPUTS.iter().any(|(ext, _)| *ext == extension)
}

/// Lowercased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

/// Output formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    GeoJson,
    Shapefile,
    Kml,
    Gpkg,
    Gpx,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::GeoJson,
        OutputFormat::Shapefile,
        OutputFormat::Kml,
        OutputFormat::Gpkg,
        OutputFormat::Gpx,
    ];

    /// The selection key, as typed by the user.
    pub fn key(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::Shapefile => "shapefile",
            OutputFormat::Kml => "kml",
            OutputFormat::Gpkg => "gpkg",
            OutputFormat::Gpx => "gpx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "GeoJSON (.geojson)",
            OutputFormat::Shapefile => "ESRI Shapefile (.zip)",
            OutputFormat::Kml => "KML (.kml)",
            OutputFormat::Gpkg => "GeoPackage (.gpkg)",
            OutputFormat::Gpx => "GPX (.gpx)",
        }
    }

    /// Extension of the produced artifact. Shapefiles are emitted zipped.
    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::Shapefile => "zip",
            OutputFormat::Kml => "kml",
            OutputFormat::Gpkg => "gpkg",
            OutputFormat::Gpx => "gpx",
        }
    }

    pub fn supported_keys() -> Vec<String> {
        Self::ALL.iter().map(|f| f.key().to_string()).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.key() == key)
            .ok_or_else(|| ConvertError::UnsupportedFormat {
                key: s.to_string(),
                supported: Self::supported_keys(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_for_known_inputs() {
        assert_eq!(input_label("zip"), Some("ESRI Shapefile (zipped)"));
        assert_eq!(input_label("GeoJSON"), Some("GeoJSON"));
        assert_eq!(input_label("xlsx"), Some("Excel"));
        assert_eq!(input_label("tiff"), None);
    }

    #[test]
    fn tabular_detection() {
        assert!(is_tabular("csv"));
        assert!(is_tabular("XLSX"));
        assert!(!is_tabular("geojson"));
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("geojson".parse::<OutputFormat>().unwrap(), OutputFormat::GeoJson);
        assert_eq!("Shapefile".parse::<OutputFormat>().unwrap(), OutputFormat::Shapefile);

        // "shp" is not a valid output key
        let err = "shp".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
    }

    #[test]
    fn shapefile_output_is_zipped() {
        assert_eq!(OutputFormat::Shapefile.file_extension(), "zip");
    }
}

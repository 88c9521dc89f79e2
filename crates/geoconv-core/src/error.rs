//! Error types for geoconv

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    // Ingestion errors
    #[error("Cannot read {path}: {reason}")]
    UnreadableSource { path: PathBuf, reason: String },

    #[error("No usable payload (.shp) found inside {archive}")]
    MissingPayload { archive: PathBuf },

    #[error("Required column '{column}' not found in table header")]
    SchemaError { column: String },

    // Export errors
    #[error("Unsupported output format '{key}'. Supported: {}", .supported.join(", "))]
    UnsupportedFormat { key: String, supported: Vec<String> },

    // Stage errors, always downgraded to report notes by the caller
    #[error("{stage} failed: {reason}")]
    StageFailure { stage: String, reason: String },

    // Driver errors for a specific format
    #[error("{format}: {message}")]
    FormatError { format: String, message: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

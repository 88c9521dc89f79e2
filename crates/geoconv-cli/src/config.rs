//! CLI configuration
//!
//! Defaults can live in a `geoconv.toml` next to where the command runs;
//! command-line flags always win over the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "geoconv.toml";

/// Optional defaults loaded from `geoconv.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Default output format key (geojson, shapefile, kml, gpkg, gpx).
    pub output_format: Option<String>,
    /// Default reprojection target.
    pub target_epsg: Option<String>,
    pub fix_invalid: Option<bool>,
    pub buffer_fallback: Option<bool>,
    pub simplify_tolerance: Option<f64>,
    pub rename_long_fields: Option<bool>,
    pub force_wgs84_label: Option<bool>,
}

/// Load configuration. An explicitly given path must exist; the implicit
/// `./geoconv.toml` is optional.
pub fn load(explicit: Option<&Path>) -> Result<CliConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), false),
    };

    if !path.exists() {
        if required {
            bail!("config file not found: {}", path.display());
        }
        return Ok(CliConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: CliConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok(config)
}

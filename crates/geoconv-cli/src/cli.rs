use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// geoconv - geospatial vector format converter
#[derive(Parser, Debug)]
#[command(name = "geoconv")]
#[command(about = "Convert geospatial vector data between common formats", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a geoconv.toml config file (defaults to ./geoconv.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a single file
    Convert(ConvertArgs),

    /// Convert every supported file under a directory
    Batch(BatchArgs),

    /// List supported input and output formats
    Formats,
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Source file (.zip shapefile bundle, .geojson, .kml, .gpkg, .gml,
    /// .gpx, .dxf, .csv, .xlsx)
    pub input: PathBuf,

    /// Output format (geojson, shapefile, kml, gpkg, gpx)
    #[arg(long, short = 't')]
    pub to: Option<String>,

    /// Reproject to this EPSG code (e.g. 3857 or EPSG:3857)
    #[arg(long, value_name = "EPSG")]
    pub target_epsg: Option<String>,

    /// Directory the artifact and report are written to
    #[arg(long, short = 'o', default_value = ".")]
    pub out: PathBuf,

    /// Simplification tolerance in CRS units
    #[arg(long, value_name = "TOL")]
    pub simplify: Option<f64>,

    /// Skip structural geometry repair
    #[arg(long)]
    pub no_fix: bool,

    /// Skip the zero-width buffer fix for self-intersecting polygons
    #[arg(long)]
    pub no_buffer_fix: bool,

    /// Keep attribute names as-is (shapefile output still truncates, but
    /// without reporting renames)
    #[arg(long)]
    pub keep_long_fields: bool,

    /// Label KML/GPX output as WGS84 without reprojecting
    #[arg(long)]
    pub force_wgs84_label: bool,

    /// Latitude column for CSV/XLSX input (guessed from headers if omitted)
    #[arg(long, value_name = "COLUMN")]
    pub lat_col: Option<String>,

    /// Longitude column for CSV/XLSX input (guessed from headers if omitted)
    #[arg(long, value_name = "COLUMN")]
    pub lon_col: Option<String>,

    /// EPSG code the CSV/XLSX coordinates are expressed in
    #[arg(long, default_value = "4326", value_name = "EPSG")]
    pub source_epsg: u32,
}

#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Directory scanned recursively for supported inputs
    pub dir: PathBuf,

    /// Output format (geojson, shapefile, kml, gpkg, gpx)
    #[arg(long, short = 't')]
    pub to: Option<String>,

    /// Reproject to this EPSG code
    #[arg(long, value_name = "EPSG")]
    pub target_epsg: Option<String>,

    /// Directory the archives are written to
    #[arg(long, short = 'o', default_value = ".")]
    pub out: PathBuf,

    /// Simplification tolerance in CRS units
    #[arg(long, value_name = "TOL")]
    pub simplify: Option<f64>,

    /// Skip structural geometry repair
    #[arg(long)]
    pub no_fix: bool,

    /// Skip the zero-width buffer fix
    #[arg(long)]
    pub no_buffer_fix: bool,

    /// Label KML/GPX output as WGS84 without reprojecting
    #[arg(long)]
    pub force_wgs84_label: bool,
}

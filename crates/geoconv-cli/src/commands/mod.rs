//! Command dispatch

mod batch;
mod convert;
mod formats;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;
use crate::output::OutputWriter;

use geoconv_core::export::ExportOptions;
use geoconv_core::registry::OutputFormat;
use geoconv_geo::ConditionOptions;
use geoconv_pipeline::ConvertOptions;

pub fn execute(cli: Cli) -> Result<()> {
    let writer = OutputWriter::new(cli.json);
    let config = crate::config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert(args) => convert::run(args, &config, &writer),
        Commands::Batch(args) => batch::run(args, &config, &writer),
        Commands::Formats => formats::run(&writer),
    }
}

/// Conversion knobs shared by `convert` and `batch`, before per-command
/// extras like the tabular mapping.
pub(crate) struct SharedArgs<'a> {
    pub to: Option<&'a str>,
    pub target_epsg: Option<&'a str>,
    pub simplify: Option<f64>,
    pub no_fix: bool,
    pub no_buffer_fix: bool,
    pub keep_long_fields: bool,
    pub force_wgs84_label: bool,
}

/// Merge CLI flags over config-file defaults into [`ConvertOptions`].
pub(crate) fn build_options(args: SharedArgs<'_>, config: &CliConfig) -> Result<ConvertOptions> {
    let format_key = args
        .to
        .map(str::to_string)
        .or_else(|| config.output_format.clone())
        .unwrap_or_else(|| "geojson".to_string());
    let output_format: OutputFormat = format_key.parse()?;

    let target_epsg = args
        .target_epsg
        .map(str::to_string)
        .or_else(|| config.target_epsg.clone());

    let condition = ConditionOptions {
        fix_invalid: if args.no_fix { false } else { config.fix_invalid.unwrap_or(true) },
        buffer_fallback: if args.no_buffer_fix {
            false
        } else {
            config.buffer_fallback.unwrap_or(true)
        },
        simplify_tolerance: args.simplify.or(config.simplify_tolerance),
    };

    let export = ExportOptions {
        rename_long_fields: if args.keep_long_fields {
            false
        } else {
            config.rename_long_fields.unwrap_or(true)
        },
        force_wgs84_label: args.force_wgs84_label
            || config.force_wgs84_label.unwrap_or(false),
    };

    Ok(ConvertOptions { output_format, target_epsg, condition, export, tabular: None })
}

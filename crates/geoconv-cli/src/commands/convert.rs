//! `geoconv convert` - single-file conversion

use anyhow::{bail, Context, Result};
use std::fs;

use geoconv_core::formats::{tabular, TabularMapping};
use geoconv_core::registry;
use geoconv_pipeline::{run_job, ConversionJob};

use crate::cli::ConvertArgs;
use crate::commands::{build_options, SharedArgs};
use crate::config::CliConfig;
use crate::output::OutputWriter;

const LARGE_INPUT_BYTES: u64 = 50 * 1024 * 1024;

pub fn run(args: ConvertArgs, config: &CliConfig, writer: &OutputWriter) -> Result<()> {
    let mut options = build_options(
        SharedArgs {
            to: args.to.as_deref(),
            target_epsg: args.target_epsg.as_deref(),
            simplify: args.simplify,
            no_fix: args.no_fix,
            no_buffer_fix: args.no_buffer_fix,
            keep_long_fields: args.keep_long_fields,
            force_wgs84_label: args.force_wgs84_label,
        },
        config,
    )?;

    let extension = registry::extension_of(&args.input).unwrap_or_default();
    if registry::is_tabular(&extension) {
        options.tabular = Some(resolve_mapping(&args)?);
    }

    if let Ok(meta) = fs::metadata(&args.input) {
        if meta.len() >= LARGE_INPUT_BYTES {
            writer.warn(format!(
                "Input is {} MB; conversion may take a while",
                meta.len() / (1024 * 1024)
            ));
        }
    }

    let outcome = run_job(&ConversionJob::new(&args.input, options));

    for line in &outcome.report.lines {
        writer.info(line);
    }

    if let Some(summary) = &outcome.summary {
        writer.section("Layer");
        writer.kv("Features", summary.features);
        writer.kv("Geometry", summary.geometry_type);
        writer.kv("CRS", &summary.crs);
        if let Some((min_x, min_y, max_x, max_y)) = summary.bounds {
            writer.kv(
                "Bounds",
                format!("{min_x:.4}, {min_y:.4} .. {max_x:.4}, {max_y:.4}"),
            );
        }
    }

    fs::create_dir_all(&args.out)?;
    let report_path = args.out.join(outcome.report.file_name());
    fs::write(&report_path, outcome.report.text())
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    match outcome.artifact {
        Some(artifact) => {
            let artifact_path = args.out.join(&artifact.file_name);
            fs::write(&artifact_path, &artifact.bytes)
                .with_context(|| format!("failed to write {}", artifact_path.display()))?;

            writer.kv("Artifact", artifact_path.display());
            writer.kv("Report", report_path.display());
            writer.success(format!("Converted {}", args.input.display()));
            Ok(())
        }
        None => {
            writer.error(format!("Conversion failed for {}", args.input.display()));
            bail!("conversion failed; see {}", report_path.display());
        }
    }
}

/// Tabular inputs need a lat/lon mapping: use the explicit columns when
/// given, otherwise guess from the header row.
fn resolve_mapping(args: &ConvertArgs) -> Result<TabularMapping> {
    let mapping = match (&args.lat_col, &args.lon_col) {
        (Some(lat), Some(lon)) => TabularMapping::new(lat, lon),
        _ => {
            let headers = tabular::headers(&args.input)?;
            TabularMapping::guess(&headers).with_context(|| {
                format!(
                    "could not guess lat/lon columns from [{}]; \
                     pass --lat-col and --lon-col",
                    headers.join(", ")
                )
            })?
        }
    };
    Ok(mapping.with_epsg(args.source_epsg))
}

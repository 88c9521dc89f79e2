//! `geoconv batch` - directory-wide conversion

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use tabled::Tabled;

use geoconv_pipeline::batch::BATCH_ARCHIVE_NAME;
use geoconv_pipeline::reports::REPORTS_ARCHIVE_NAME;
use geoconv_pipeline::{run_batch, scan_directory, ReportLog};

use crate::cli::BatchArgs;
use crate::commands::{build_options, SharedArgs};
use crate::config::CliConfig;
use crate::output::OutputWriter;

#[derive(Tabled, Serialize)]
struct BatchRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Details")]
    details: String,
}

pub fn run(args: BatchArgs, config: &CliConfig, writer: &OutputWriter) -> Result<()> {
    let options = build_options(
        SharedArgs {
            to: args.to.as_deref(),
            target_epsg: args.target_epsg.as_deref(),
            simplify: args.simplify,
            no_fix: args.no_fix,
            no_buffer_fix: args.no_buffer_fix,
            keep_long_fields: false,
            force_wgs84_label: args.force_wgs84_label,
        },
        config,
    )?;

    let inputs = scan_directory(&args.dir)?;
    if inputs.is_empty() {
        bail!("no supported input files under {}", args.dir.display());
    }
    writer.info(format!("Converting {} file(s) from {}", inputs.len(), args.dir.display()));

    let result = run_batch(&inputs, &options)?;

    let rows: Vec<BatchRow> = result
        .reports
        .iter()
        .map(|report| BatchRow {
            file: report.source.file_name().unwrap_or_default().to_string_lossy().into_owned(),
            status: if report.succeeded { "ok".to_string() } else { "failed".to_string() },
            details: report.lines.last().cloned().unwrap_or_default(),
        })
        .collect();
    writer.table(rows);

    fs::create_dir_all(&args.out)?;
    let archive_path = args.out.join(BATCH_ARCHIVE_NAME);
    fs::write(&archive_path, &result.archive)
        .with_context(|| format!("failed to write {}", archive_path.display()))?;

    let mut log = ReportLog::with_window(result.reports.len().max(1));
    for report in &result.reports {
        log.push(report.clone());
    }
    let reports_path = args.out.join(REPORTS_ARCHIVE_NAME);
    fs::write(&reports_path, log.archive()?)
        .with_context(|| format!("failed to write {}", reports_path.display()))?;

    writer.kv("Outputs", archive_path.display());
    writer.kv("Reports", reports_path.display());
    writer.success(format!(
        "Converted {}/{} file(s), {} failed",
        result.produced,
        inputs.len(),
        result.failed()
    ));
    Ok(())
}

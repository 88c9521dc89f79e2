//! Batch conversion
//!
//! Runs a list of source files through the job pipeline and bundles every
//! produced artifact plus per-file report into one zip archive. Tabular
//! files are skipped in batch mode because their column mapping is
//! interactive by nature.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use geoconv_core::error::{ConvertError, Result};
use geoconv_core::registry;

use crate::job::{run_job, ConversionJob, ConversionReport, ConvertOptions};

/// Name of the archive bundling artifacts and reports.
pub const BATCH_ARCHIVE_NAME: &str = "converted_outputs.zip";

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchResult {
    /// Zip archive holding every artifact and every report file.
    pub archive: Vec<u8>,
    pub reports: Vec<ConversionReport>,
    /// Number of artifacts produced (inputs minus failures and skips).
    pub produced: usize,
}

impl BatchResult {
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| !r.succeeded).count()
    }
}

/// Convert every input with the same options and bundle the results.
pub fn run_batch(inputs: &[PathBuf], options: &ConvertOptions) -> Result<BatchResult> {
    let mut reports = Vec::new();
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    let mut produced = 0usize;

    for input in inputs {
        let extension = registry::extension_of(input).unwrap_or_default();
        if registry::is_tabular(&extension) && options.tabular.is_none() {
            let mut report = skip_report(input);
            report.push(
                "Skipped: tabular files need a lat/lon column mapping; \
                 convert them individually.",
            );
            entries.push((report.file_name(), report.text().into_bytes()));
            reports.push(report);
            continue;
        }

        let outcome = run_job(&ConversionJob::new(input, options.clone()));
        if let Some(artifact) = outcome.artifact {
            entries.push((artifact.file_name.clone(), artifact.bytes));
            produced += 1;
        }
        entries.push((outcome.report.file_name(), outcome.report.text().into_bytes()));
        reports.push(outcome.report);
    }

    let archive = zip_entries(&entries)?;
    info!(inputs = inputs.len(), produced, "batch finished");
    Ok(BatchResult { archive, reports, produced })
}

fn skip_report(input: &Path) -> ConversionReport {
    ConversionReport {
        source: input.to_path_buf(),
        lines: Vec::new(),
        succeeded: false,
    }
}

/// Recursively collect supported input files under a directory, sorted for
/// stable batch ordering.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvertError::UnreadableSource {
            path: dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut found = Vec::new();
    collect_inputs(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_inputs(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_inputs(&path, found)?;
        } else if let Some(extension) = registry::extension_of(&path) {
            if registry::is_supported_input(&extension) {
                found.push(path);
            }
        }
    }
    Ok(())
}

/// Build an in-memory zip from (name, bytes) pairs.
pub(crate) fn zip_entries(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in entries {
            zip.start_file(name.clone(), options).map_err(zip_error)?;
            zip.write_all(bytes)?;
        }
        zip.finish().map_err(zip_error)?;
    }
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> ConvertError {
    ConvertError::Serialization(format!("zip packaging failed: {e}"))
}

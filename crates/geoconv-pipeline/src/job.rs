//! Single-file conversion jobs
//!
//! [`run_job`] carries one source file through read, condition, reproject
//! and export. It is infallible by construction: anything that goes wrong
//! becomes a line in the [`ConversionReport`], and the artifact is simply
//! absent on failure.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::info;

use geoconv_core::export::{export, ExportArtifact, ExportOptions};
use geoconv_core::formats::{read_collection, TabularMapping};
use geoconv_core::model::FeatureCollection;
use geoconv_core::registry::OutputFormat;
use geoconv_geo::{condition, reproject, ConditionOptions};

/// Everything a conversion needs besides the source path.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output_format: OutputFormat,
    /// Target EPSG code ("3857" or "EPSG:3857"); no reprojection when `None`.
    pub target_epsg: Option<String>,
    pub condition: ConditionOptions,
    pub export: ExportOptions,
    /// Column mapping for CSV/XLSX sources.
    pub tabular: Option<TabularMapping>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::GeoJson,
            target_epsg: None,
            condition: ConditionOptions::default(),
            export: ExportOptions::default(),
            tabular: None,
        }
    }
}

/// One source file plus its conversion options.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub options: ConvertOptions,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, options: ConvertOptions) -> Self {
        Self { source: source.into(), options }
    }
}

/// Per-job report: one line per pipeline step, success or failure.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub lines: Vec<String>,
    pub succeeded: bool,
}

impl ConversionReport {
    fn new(source: &Path) -> Self {
        Self { source: source.to_path_buf(), lines: Vec::new(), succeeded: false }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Name of the report file written next to the artifact.
    pub fn file_name(&self) -> String {
        let stem = self
            .source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("conversion");
        format!("{stem}_report.txt")
    }

    /// Report body, one line per step.
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            "No details.".to_string()
        } else {
            self.lines.join("\n")
        }
    }
}

/// Snapshot of the loaded layer after conditioning and reprojection, for
/// display alongside the conversion result.
#[derive(Debug, Clone)]
pub struct LayerSummary {
    pub features: usize,
    pub geometry_type: &'static str,
    pub crs: String,
    /// (min_x, min_y, max_x, max_y)
    pub bounds: Option<(f64, f64, f64, f64)>,
}

impl LayerSummary {
    fn of(collection: &FeatureCollection) -> Self {
        Self {
            features: collection.len(),
            geometry_type: collection.dominant_geometry_type().unwrap_or("None"),
            crs: collection.crs_label(),
            bounds: collection
                .bounds()
                .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y)),
        }
    }
}

/// Result of a job: the report is always present, the artifact only on
/// success.
#[derive(Debug)]
pub struct JobOutcome {
    pub report: ConversionReport,
    pub artifact: Option<ExportArtifact>,
    /// Absent when the source could not be read at all.
    pub summary: Option<LayerSummary>,
}

/// Run one conversion end to end.
pub fn run_job(job: &ConversionJob) -> JobOutcome {
    let mut report = ConversionReport::new(&job.source);

    let scratch = match TempDir::new() {
        Ok(dir) => dir,
        Err(e) => {
            report.push(format!("Read/Process failed: {e}"));
            return JobOutcome { report, artifact: None, summary: None };
        }
    };

    let mut collection =
        match read_collection(&job.source, scratch.path(), job.options.tabular.as_ref()) {
            Ok(collection) => collection,
            Err(e) => {
                report.push(format!("Read/Process failed: {e}"));
                return JobOutcome { report, artifact: None, summary: None };
            }
        };

    report.push(format!(
        "Loaded {} features. CRS={}.",
        collection.len(),
        collection.crs_label()
    ));

    for note in condition(&mut collection, &job.options.condition) {
        report.push(note);
    }

    if let Some(target) = &job.options.target_epsg {
        if let Some(note) = reproject(&mut collection, target) {
            report.push(note);
        }
    }

    let summary = LayerSummary::of(&collection);

    let base = job
        .source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted")
        .to_string();

    match export(
        &collection,
        job.options.output_format,
        &base,
        scratch.path(),
        &job.options.export,
    ) {
        Ok(artifact) => {
            for note in &artifact.notes {
                report.push(note.clone());
            }
            report.push(format!("Exported: {}", artifact.file_name));
            report.succeeded = true;
            info!(source = %job.source.display(), artifact = %artifact.file_name, "converted");
            JobOutcome { report, artifact: Some(artifact), summary: Some(summary) }
        }
        Err(e) => {
            report.push(format!("Read/Process failed: {e}"));
            JobOutcome { report, artifact: None, summary: Some(summary) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn geojson_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("sites.geojson");
        fs::write(
            &path,
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "geometry": {"type": "Point", "coordinates": [77.6, 12.9]},
                        "properties": {"name": "A"}
                    }
                ]
            }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn successful_job_reports_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let source = geojson_fixture(dir.path());

        let job = ConversionJob::new(&source, ConvertOptions::default());
        let outcome = run_job(&job);

        assert!(outcome.report.succeeded);
        assert_eq!(outcome.report.lines[0], "Loaded 1 features. CRS=EPSG:4326.");
        assert_eq!(outcome.report.lines.last().unwrap(), "Exported: sites.geojson");
        assert_eq!(outcome.report.file_name(), "sites_report.txt");
        assert!(outcome.artifact.is_some());

        let summary = outcome.summary.unwrap();
        assert_eq!(summary.features, 1);
        assert_eq!(summary.geometry_type, "Point");
        assert_eq!(summary.crs, "EPSG:4326");
        assert!(summary.bounds.is_some());
    }

    #[test]
    fn reprojection_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = geojson_fixture(dir.path());

        let options = ConvertOptions {
            target_epsg: Some("3857".to_string()),
            ..Default::default()
        };
        let outcome = run_job(&ConversionJob::new(&source, options));

        assert!(outcome.report.lines.contains(&"Reprojected to EPSG:3857.".to_string()));
    }

    #[test]
    fn unreadable_source_fails_with_report() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.geojson");
        fs::write(&source, "garbage").unwrap();

        let outcome = run_job(&ConversionJob::new(&source, ConvertOptions::default()));

        assert!(!outcome.report.succeeded);
        assert!(outcome.artifact.is_none());
        assert!(outcome.report.lines[0].starts_with("Read/Process failed:"));
    }

    #[test]
    fn tabular_source_without_mapping_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("points.csv");
        fs::write(&source, "lat,lon\n1,2\n").unwrap();

        let outcome = run_job(&ConversionJob::new(&source, ConvertOptions::default()));
        assert!(!outcome.report.succeeded);
    }

    #[test]
    fn empty_report_text_has_fallback() {
        let report = ConversionReport::new(Path::new("x.geojson"));
        assert_eq!(report.text(), "No details.");
    }
}

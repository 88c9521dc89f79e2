//! Conversion pipeline for geoconv
//!
//! Ties ingestion, conditioning, reprojection and export together into
//! per-file jobs ([`run_job`]) and directory-wide batches ([`run_batch`]).
//! A job never returns an error: every failure ends up as a line in its
//! [`ConversionReport`].

pub mod batch;
pub mod job;
pub mod reports;

pub use batch::{run_batch, scan_directory, BatchResult};
pub use job::{run_job, ConversionJob, ConversionReport, ConvertOptions, JobOutcome, LayerSummary};
pub use reports::ReportLog;

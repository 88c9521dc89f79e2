//! Conversion report log
//!
//! Keeps a bounded window of the most recent conversion reports and can
//! bundle them into a standalone archive, independent of the artifacts.

use std::collections::VecDeque;

use geoconv_core::error::Result;

use crate::batch::zip_entries;
use crate::job::ConversionReport;

/// Name of the reports-only archive.
pub const REPORTS_ARCHIVE_NAME: &str = "conversion_reports.zip";

const DEFAULT_WINDOW: usize = 5;

/// Bounded log of recent conversion reports, newest last.
#[derive(Debug)]
pub struct ReportLog {
    window: usize,
    reports: VecDeque<ConversionReport>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        Self { window: window.max(1), reports: VecDeque::new() }
    }

    /// Append a report, evicting the oldest once the window is full.
    pub fn push(&mut self, report: ConversionReport) {
        if self.reports.len() == self.window {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    pub fn recent(&self) -> impl Iterator<Item = &ConversionReport> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Zip the logged reports into a reports-only archive.
    pub fn archive(&self) -> Result<Vec<u8>> {
        let entries: Vec<(String, Vec<u8>)> = self
            .reports
            .iter()
            .map(|report| (report.file_name(), report.text().into_bytes()))
            .collect();
        zip_entries(&entries)
    }
}

impl Default for ReportLog {
    fn default() -> Self {
        Self::new()
    }
}

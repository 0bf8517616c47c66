//! Per-run quality report: one record per discovered input file, persisted
//! as a single CSV artifact that fully replaces the previous run's output.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::metrics::QualityMetrics;

/// Terminal state of one file's trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Approved,
    Quarantined,
    Error,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verdict::Approved => "Approved",
            Verdict::Quarantined => "Quarantined",
            Verdict::Error => "Error",
        })
    }
}

/// One report row. Metric fields default to 0 for files that failed before
/// metrics existed; `error` is populated only for `Error` verdicts.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub filename: String,
    pub status: Verdict,
    pub duration_sec: f64,
    pub snr_db: f64,
    pub clipping_pct: f64,
    pub error: Option<String>,
}

impl ReportRecord {
    /// Record for a file that made it through metric extraction, rounded to
    /// two decimals like the reference report.
    pub fn measured(filename: String, status: Verdict, metrics: &QualityMetrics) -> Self {
        Self {
            filename,
            status,
            duration_sec: round2(metrics.duration_sec),
            snr_db: round2(metrics.snr_db),
            clipping_pct: round2(metrics.clipping_pct),
            error: None,
        }
    }

    /// Record for a file that failed at any stage.
    pub fn failed(filename: String, error: String) -> Self {
        Self {
            filename,
            status: Verdict::Error,
            duration_sec: 0.0,
            snr_db: 0.0,
            clipping_pct: 0.0,
            error: Some(error),
        }
    }
}

/// Round to two decimals, the precision the report and stats surfaces share.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Full batch report in file-discovery order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub records: Vec<ReportRecord>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.records.iter().filter(|r| r.status == verdict).count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist as CSV, overwriting any previous artifact. A run with zero
    /// discovered files still writes the header row so the schema is intact.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        if self.records.is_empty() {
            writer.write_record([
                "filename",
                "status",
                "duration_sec",
                "snr_db",
                "clipping_pct",
                "error",
            ])?;
        } else {
            for record in &self.records {
                writer.serialize(record)?;
            }
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

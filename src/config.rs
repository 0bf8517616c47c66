//! Pipeline configuration: directory layout, target sample rate and the
//! quality thresholds applied by the classifier.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through a TOML file and shared across
//! worker tasks. Directory creation is an explicit step ([`PipelineConfig::
//! ensure_directories`]) invoked once by the process entry point, never a
//! load-time side effect.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Audio sample rate every input is normalized to before analysis.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// QualityThresholds
// ---------------------------------------------------------------------------

/// Limits applied to the measured quality metrics.
///
/// A file violating any limit is quarantined; the checks are cumulative, so
/// one file can carry several failure reasons at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum clip duration in seconds.
    pub min_duration: f64,
    /// Maximum clip duration in seconds.
    pub max_duration: f64,
    /// Minimum estimated signal-to-noise ratio in dB.
    pub min_snr: f64,
    /// Maximum percentage of clipped samples (0.0–100.0).
    pub max_clipping_pct: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_duration: 1.0,
            max_duration: 10.0,
            min_snr: 15.0,
            max_clipping_pct: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Full configuration for one pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for raw `.wav` input files.
    pub raw_dir: PathBuf,
    /// Destination for denoised copies of approved files.
    pub clean_dir: PathBuf,
    /// Destination for rejected files, tagged with their failure reasons.
    pub quarantine_dir: PathBuf,
    /// Destination for the reference copy + augmented variants.
    pub augmented_dir: PathBuf,
    /// Path of the per-run CSV quality report (overwritten each run).
    pub report_path: PathBuf,
    /// Sample rate all inputs are resampled to at decode time.
    pub sample_rate: u32,
    /// Quality limits applied by the classifier.
    pub thresholds: QualityThresholds,
    /// Ceiling on per-file processing time; a file exceeding it becomes an
    /// `Error` row and the batch continues.
    pub per_file_timeout_secs: u64,
    /// Optional RNG seed for the augmentation engine. `None` draws from OS
    /// entropy; set it to make augmented outputs reproducible.
    pub augment_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let base = PathBuf::from("data");
        Self {
            raw_dir: base.join("raw_data"),
            clean_dir: base.join("clean_data"),
            quarantine_dir: base.join("quarantine"),
            augmented_dir: base.join("augmented_final"),
            report_path: PathBuf::from("reports").join("quality_report.csv"),
            sample_rate: TARGET_SAMPLE_RATE,
            thresholds: QualityThresholds::default(),
            per_file_timeout_secs: 120,
            augment_seed: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file. Missing keys fall back to the
    /// defaults above.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Create every directory the pipeline writes to (plus the report's
    /// parent). Called once at startup by the process entry point.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.raw_dir,
            &self.clean_dir,
            &self.quarantine_dir,
            &self.augmented_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

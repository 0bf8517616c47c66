//! Quality classification and the quarantine-filename micro-protocol.
//!
//! Failure reasons are appended in a fixed order (duration-short,
//! duration-long, SNR, clipping); the order is preserved in the quarantine
//! filename and the report. The filename doubles as a small serialization
//! format consumed by the stats endpoint, so the encode and decode halves
//! live side by side here rather than in two independent implementations.

use crate::config::QualityThresholds;
use crate::metrics::QualityMetrics;

/// Reason a recording failed quality gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    TooShort,
    TooLong,
    LowSnr,
    Clipping,
}

impl FailureReason {
    /// Token used in quarantine filenames and report output.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::TooShort => "TooShort",
            FailureReason::TooLong => "TooLong",
            FailureReason::LowSnr => "LowSNR",
            FailureReason::Clipping => "Clipping",
        }
    }

    /// Inverse of [`as_str`](Self::as_str); `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TooShort" => Some(FailureReason::TooShort),
            "TooLong" => Some(FailureReason::TooLong),
            "LowSNR" => Some(FailureReason::LowSnr),
            "Clipping" => Some(FailureReason::Clipping),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate all four checks, in fixed order, with no early exit.
/// An empty result means the file passed.
pub fn evaluate(metrics: &QualityMetrics, thresholds: &QualityThresholds) -> Vec<FailureReason> {
    let mut reasons = Vec::new();

    if metrics.duration_sec < thresholds.min_duration {
        reasons.push(FailureReason::TooShort);
    }
    if metrics.duration_sec > thresholds.max_duration {
        reasons.push(FailureReason::TooLong);
    }
    if metrics.snr_db < thresholds.min_snr {
        reasons.push(FailureReason::LowSnr);
    }
    if metrics.clipping_pct > thresholds.max_clipping_pct {
        reasons.push(FailureReason::Clipping);
    }

    reasons
}

/// Encode: `<stem>_<Reason1>[_<Reason2>...].wav`, reasons in evaluation order.
pub fn quarantine_file_name(stem: &str, reasons: &[FailureReason]) -> String {
    let tags: Vec<&str> = reasons.iter().map(|r| r.as_str()).collect();
    format!("{}_{}.wav", stem, tags.join("_"))
}

/// Decode: recover the failure reasons from a quarantine filename.
///
/// Every underscore-delimited token after the first is considered; tokens
/// that are not reason tags (underscores in the original stem) are skipped.
pub fn reasons_from_file_name(file_name: &str) -> Vec<FailureReason> {
    let stem = file_name.strip_suffix(".wav").unwrap_or(file_name);
    stem.split('_')
        .skip(1)
        .filter_map(FailureReason::from_token)
        .collect()
}

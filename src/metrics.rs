//! Objective quality metrics computed from a decoded mono buffer.
//!
//! All three signals are deterministic functions of the samples, so reruns
//! over unchanged input always reproduce the same report.

use serde::Serialize;

/// Near-full-scale amplitude above which a sample counts as clipped.
const CLIPPING_THRESHOLD: f32 = 0.99;

/// SNR reported when the estimated noise floor is zero or negative
/// (effectively silent floor; avoids log of a non-positive value).
pub const SNR_SILENT_FLOOR_DB: f64 = 100.0;

/// Measured quality signals for one recording. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub duration_sec: f64,
    pub snr_db: f64,
    pub clipping_pct: f64,
}

impl QualityMetrics {
    /// Compute metrics from a mono buffer at `sample_rate`.
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            duration_sec: samples.len() as f64 / sample_rate as f64,
            snr_db: estimate_snr(samples),
            clipping_pct: clipping_pct(samples),
        }
    }
}

/// Estimate SNR in dB: mean per-sample energy over the 10th percentile of
/// energy (noise-floor proxy).
fn estimate_snr(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return SNR_SILENT_FLOOR_DB;
    }

    let mut energy: Vec<f64> = samples.iter().map(|&s| (s as f64) * (s as f64)).collect();
    let signal_power = energy.iter().sum::<f64>() / energy.len() as f64;

    // total_cmp: decodable float WAVs can legitimately carry NaN samples
    energy.sort_by(|a, b| a.total_cmp(b));
    let noise_floor = percentile_sorted(&energy, 0.10);

    if noise_floor <= 0.0 {
        return SNR_SILENT_FLOOR_DB;
    }

    10.0 * (signal_power / noise_floor).log10()
}

/// Linear-interpolated percentile of an already-sorted slice, `q` in [0, 1].
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Percentage of samples at or above the clipping threshold.
fn clipping_pct(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let clipped = samples
        .iter()
        .filter(|&&s| s.abs() >= CLIPPING_THRESHOLD)
        .count();
    clipped as f64 / samples.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_len_over_rate() {
        let m = QualityMetrics::compute(&vec![0.1; 8_000], 16_000);
        assert!((m.duration_sec - 0.5).abs() < 1e-9);
    }

    #[test]
    fn all_zero_buffer_hits_snr_sentinel() {
        let m = QualityMetrics::compute(&vec![0.0; 16_000], 16_000);
        assert_eq!(m.snr_db, SNR_SILENT_FLOOR_DB);
    }

    #[test]
    fn sparse_signal_over_silence_hits_sentinel() {
        // 80% exact zeros: the 10th-percentile energy is 0 -> sentinel
        let mut samples = vec![0.0_f32; 8_000];
        samples.extend(vec![0.5_f32; 2_000]);
        let m = QualityMetrics::compute(&samples, 16_000);
        assert_eq!(m.snr_db, SNR_SILENT_FLOOR_DB);
    }

    #[test]
    fn uniform_buffer_has_zero_snr() {
        // Constant energy: noise floor equals signal power
        let m = QualityMetrics::compute(&vec![0.5; 16_000], 16_000);
        assert!(m.snr_db.abs() < 1e-9, "snr {}", m.snr_db);
    }

    #[test]
    fn clipping_bounds_hold() {
        let m = QualityMetrics::compute(&vec![1.0; 100], 16_000);
        assert_eq!(m.clipping_pct, 100.0);

        let m = QualityMetrics::compute(&vec![0.5; 100], 16_000);
        assert_eq!(m.clipping_pct, 0.0);
    }

    #[test]
    fn clipping_counts_threshold_inclusive() {
        // |s| >= 0.99 counts as clipped
        let mut samples = vec![0.5_f32; 99];
        samples.push(0.99);
        let m = QualityMetrics::compute(&samples, 16_000);
        assert!((m.clipping_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nan_samples_do_not_panic() {
        let mut samples = vec![0.3_f32; 100];
        samples[50] = f32::NAN;

        let m = QualityMetrics::compute(&samples, 16_000);
        assert!((m.duration_sec - 100.0 / 16_000.0).abs() < 1e-9);
        // NaN never compares >= threshold, so it cannot count as clipped
        assert_eq!(m.clipping_pct, 0.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert!((percentile_sorted(&sorted, 0.10) - 1.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 0.05) - 0.5).abs() < 1e-12);
    }
}

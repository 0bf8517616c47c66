//! Stationary spectral noise suppression followed by edge silence trimming.
//!
//! The denoiser runs an STFT (Hann window, 75% overlap), estimates a noise
//! magnitude profile from the lowest-energy frames of the recording itself,
//! applies a per-bin Wiener-style gain scaled by a fixed reduction
//! proportion, and resynthesizes with overlap-add. Trimming then drops
//! leading/trailing frames more than 20 dB below the loudest frame.

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Fraction of the estimated noise magnitude removed from each bin.
pub const NOISE_REDUCTION_PROPORTION: f32 = 0.75;

/// Loudness threshold, relative to the peak frame, below which leading and
/// trailing audio is trimmed.
pub const TRIM_THRESHOLD_DB: f32 = 20.0;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = FFT_SIZE / 4;

/// Denoise a passing recording and trim edge silence.
///
/// The sample rate is never altered; only the length may shrink. A buffer
/// whose every frame falls below the trim threshold is a file-level error.
pub fn clean(samples: &[f32]) -> Result<Vec<f32>> {
    let mut denoised = samples.to_vec();

    let mut denoiser = SpectralDenoiser::new(FFT_SIZE, NOISE_REDUCTION_PROPORTION);
    denoiser.estimate_noise_profile(&denoised);
    denoiser.process(&mut denoised);

    trim_silence(&denoised, TRIM_THRESHOLD_DB)
}

/// FFT-based stationary spectral denoiser.
struct SpectralDenoiser {
    fft_size: usize,
    hop_size: usize,
    noise_profile: Vec<f32>,
    reduction_proportion: f32,
    forward_fft: Arc<dyn RealToComplex<f32>>,
    inverse_fft: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
}

impl SpectralDenoiser {
    fn new(fft_size: usize, reduction_proportion: f32) -> Self {
        let hop_size = fft_size / 4; // 75% overlap

        let mut planner = RealFftPlanner::<f32>::new();
        let forward_fft = planner.plan_fft_forward(fft_size);
        let inverse_fft = planner.plan_fft_inverse(fft_size);

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        Self {
            fft_size,
            hop_size,
            noise_profile: vec![0.0; fft_size / 2 + 1],
            reduction_proportion,
            forward_fft,
            inverse_fft,
            window,
        }
    }

    /// Estimate the stationary noise profile from the quietest 10% of frames.
    fn estimate_noise_profile(&mut self, samples: &[f32]) {
        let mut frame_energies: Vec<(usize, f32)> = Vec::new();

        let mut pos = 0;
        while pos + self.fft_size <= samples.len() {
            let frame = &samples[pos..pos + self.fft_size];
            let energy: f32 = frame.iter().map(|s| s * s).sum();
            frame_energies.push((pos, energy));
            pos += self.hop_size;
        }

        if frame_energies.is_empty() {
            return;
        }

        frame_energies.sort_by(|a, b| a.1.total_cmp(&b.1));
        let quiet_count = (frame_energies.len() / 10).max(1);

        let mut spectrum_sum = vec![0.0f32; self.fft_size / 2 + 1];
        let mut frame_count = 0;

        for &(start, _) in frame_energies.iter().take(quiet_count) {
            let mut buffer: Vec<f32> = samples[start..start + self.fft_size]
                .iter()
                .zip(&self.window)
                .map(|(s, w)| s * w)
                .collect();

            let mut spectrum = self.forward_fft.make_output_vec();
            if self.forward_fft.process(&mut buffer, &mut spectrum).is_ok() {
                for (i, c) in spectrum.iter().enumerate() {
                    spectrum_sum[i] += c.norm();
                }
                frame_count += 1;
            }
        }

        if frame_count > 0 {
            for (profile, sum) in self.noise_profile.iter_mut().zip(&spectrum_sum) {
                *profile = sum / frame_count as f32;
            }
        }
    }

    /// Suppress the noise profile in-place.
    ///
    /// Per bin: a Wiener gain is computed against the noise estimate, then
    /// blended with unity by the reduction proportion, so 1.0 applies the
    /// full Wiener gain and 0.0 leaves the signal untouched.
    fn process(&mut self, samples: &mut [f32]) {
        if samples.len() < self.fft_size {
            return;
        }

        let floor = 0.02; // Minimum Wiener gain to avoid complete silence

        let mut output = vec![0.0f32; samples.len()];
        let mut window_sum = vec![0.0f32; samples.len()];

        let mut pos = 0;
        while pos + self.fft_size <= samples.len() {
            let mut buffer: Vec<f32> = samples[pos..pos + self.fft_size]
                .iter()
                .zip(&self.window)
                .map(|(s, w)| s * w)
                .collect();

            let mut spectrum = self.forward_fft.make_output_vec();

            if self.forward_fft.process(&mut buffer, &mut spectrum).is_ok() {
                for (i, c) in spectrum.iter_mut().enumerate() {
                    let signal_mag = c.norm();
                    let noise_mag = self.noise_profile[i];

                    let wiener = if signal_mag > 0.0 {
                        let snr = signal_mag / (noise_mag + 1e-10);
                        ((snr - 1.0) / snr).max(floor)
                    } else {
                        floor
                    };

                    let gain = 1.0 - self.reduction_proportion * (1.0 - wiener);
                    *c = *c * gain;
                }

                let mut time_buffer = self.inverse_fft.make_output_vec();
                if self
                    .inverse_fft
                    .process(&mut spectrum, &mut time_buffer)
                    .is_ok()
                {
                    let norm = 1.0 / self.fft_size as f32;
                    for (i, sample) in time_buffer.iter().enumerate() {
                        output[pos + i] += sample * norm * self.window[i];
                        window_sum[pos + i] += self.window[i] * self.window[i];
                    }
                }
            }

            pos += self.hop_size;
        }

        // Overlap-add normalization
        for (i, sample) in samples.iter_mut().enumerate() {
            if window_sum[i] > 0.001 {
                *sample = output[i] / window_sum[i];
            }
        }
    }
}

/// Trim leading and trailing frames quieter than `threshold_db` below the
/// loudest frame (frame RMS, same frame/hop as the STFT).
fn trim_silence(samples: &[f32], threshold_db: f32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(PipelineError::TrimmedToSilence);
    }

    let frame = FFT_SIZE.min(samples.len());
    let hop = HOP_SIZE.min(frame);

    let mut rms: Vec<f32> = Vec::new();
    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + frame).min(samples.len());
        let chunk = &samples[pos..end];
        let mean_sq = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
        rms.push(mean_sq.sqrt());
        if end == samples.len() {
            break;
        }
        pos += hop;
    }

    let peak = rms.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return Err(PipelineError::TrimmedToSilence);
    }

    let threshold = peak * 10.0f32.powf(-threshold_db / 20.0);

    let first = rms.iter().position(|&r| r > threshold);
    let last = rms.iter().rposition(|&r| r > threshold);

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = first * hop;
            let end = (last * hop + frame).min(samples.len());
            Ok(samples[start..end].to_vec())
        }
        _ => Err(PipelineError::TrimmedToSilence),
    }
}

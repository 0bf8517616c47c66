//! Stochastic augmentation of approved, denoised recordings.
//!
//! Each variant draws an independent Bernoulli composition of three
//! transforms, applied in fixed order: time-stretch, pitch-shift, additive
//! Gaussian noise. The random source is injectable so tests can pin a seed;
//! production runs draw from OS entropy.

pub mod stretch;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio_io;
use crate::error::Result;

/// Stochastic variants produced per approved file (plus one untouched copy).
pub const NUM_VARIANTS: usize = 3;

const STRETCH_PROBABILITY: f64 = 0.5;
const STRETCH_RATE_RANGE: (f32, f32) = (0.8, 1.2);

const PITCH_PROBABILITY: f64 = 0.5;
const PITCH_SEMITONE_RANGE: (f32, f32) = (-2.0, 2.0);

const NOISE_PROBABILITY: f64 = 0.3;
const NOISE_AMPLITUDE_RANGE: (f32, f32) = (0.001, 0.015);

/// Randomized transform composer. One instance drives all variants of a
/// file so draws stay independent across variants.
pub struct Augmenter {
    rng: StdRng,
    sample_rate: u32,
}

impl Augmenter {
    /// `seed`: `Some` pins the RNG for reproducible output, `None` uses OS
    /// entropy.
    pub fn new(sample_rate: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, sample_rate }
    }

    /// Produce one augmented variant. A variant may receive any subset of
    /// the three transforms, including none.
    pub fn variant(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let mut out = samples.to_vec();

        if self.rng.gen_bool(STRETCH_PROBABILITY) {
            let rate = self.rng.gen_range(STRETCH_RATE_RANGE.0..=STRETCH_RATE_RANGE.1);
            out = stretch::time_stretch(&out, rate);
        }

        if self.rng.gen_bool(PITCH_PROBABILITY) {
            let semitones =
                self.rng.gen_range(PITCH_SEMITONE_RANGE.0..=PITCH_SEMITONE_RANGE.1);
            out = pitch_shift(&out, self.sample_rate, semitones)?;
        }

        if self.rng.gen_bool(NOISE_PROBABILITY) {
            let amplitude =
                self.rng.gen_range(NOISE_AMPLITUDE_RANGE.0..=NOISE_AMPLITUDE_RANGE.1);
            add_gaussian_noise(&mut out, amplitude, &mut self.rng);
        }

        Ok(out)
    }
}

/// Shift pitch by `semitones` while keeping the duration: stretch to
/// counter-scale the length, then resample back to the original rate.
pub fn pitch_shift(samples: &[f32], sample_rate: u32, semitones: f32) -> Result<Vec<f32>> {
    let factor = 2.0f32.powf(semitones / 12.0);
    if (factor - 1.0).abs() < 1e-4 {
        return Ok(samples.to_vec());
    }

    let stretched = stretch::time_stretch(samples, 1.0 / factor);
    let shifted_rate = (sample_rate as f32 * factor).round() as u32;
    audio_io::resample(&stretched, shifted_rate, sample_rate)
}

/// Mix zero-mean Gaussian noise with standard deviation `amplitude` into
/// the buffer.
pub fn add_gaussian_noise(samples: &mut [f32], amplitude: f32, rng: &mut impl Rng) {
    for sample in samples.iter_mut() {
        *sample += amplitude * standard_normal(rng);
    }
}

/// One standard-normal draw (Box-Muller over two uniforms).
fn standard_normal(rng: &mut impl Rng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.5)
            .collect()
    }

    #[test]
    fn seeded_augmenter_is_deterministic() {
        let samples = tone(16_384);

        let mut a = Augmenter::new(16_000, Some(42));
        let mut b = Augmenter::new(16_000, Some(42));

        for _ in 0..NUM_VARIANTS {
            let va = a.variant(&samples).unwrap();
            let vb = b.variant(&samples).unwrap();
            assert_eq!(va, vb);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let samples = tone(16_384);

        let mut a = Augmenter::new(16_000, Some(1));
        let mut b = Augmenter::new(16_000, Some(2));

        let all_equal = (0..8).all(|_| {
            a.variant(&samples).unwrap() == b.variant(&samples).unwrap()
        });
        assert!(!all_equal);
    }

    #[test]
    fn variant_length_stays_within_stretch_bounds() {
        let samples = tone(32_768);
        let mut augmenter = Augmenter::new(16_000, Some(7));

        for _ in 0..16 {
            let v = augmenter.variant(&samples).unwrap();
            let ratio = v.len() as f64 / samples.len() as f64;
            // 1/1.2 .. 1/0.8 with headroom for frame-quantization error
            assert!(
                (0.7..=1.4).contains(&ratio),
                "variant length ratio out of bounds: {ratio}"
            );
        }
    }

    #[test]
    fn pitch_shift_keeps_duration() {
        let samples = tone(32_768);
        let shifted = pitch_shift(&samples, 16_000, 2.0).unwrap();
        let ratio = shifted.len() as f64 / samples.len() as f64;
        assert!((0.9..=1.1).contains(&ratio), "length ratio {ratio}");
    }

    #[test]
    fn pitch_shift_zero_semitones_is_noop() {
        let samples = tone(4_096);
        assert_eq!(pitch_shift(&samples, 16_000, 0.0).unwrap(), samples);
    }

    #[test]
    fn gaussian_noise_matches_requested_spread() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut samples = vec![0.0f32; 100_000];
        add_gaussian_noise(&mut samples, 0.01, &mut rng);

        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>()
            / samples.len() as f32;

        assert!(mean.abs() < 1e-3, "mean {mean}");
        assert!(
            (var.sqrt() - 0.01).abs() < 1e-3,
            "stddev {} vs requested 0.01",
            var.sqrt()
        );
    }
}

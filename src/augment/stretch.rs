//! Phase-vocoder time stretching.
//!
//! Changes duration without changing pitch: analysis frames are read at a
//! hop scaled by the stretch rate, per-bin instantaneous frequencies are
//! re-accumulated at the synthesis hop, and frames are overlap-added back.

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

const FFT_SIZE: usize = 2048;
const SYNTHESIS_HOP: usize = FFT_SIZE / 4;

/// Stretch `samples` by `rate`: the output holds roughly `len / rate`
/// samples, so `rate > 1.0` shortens (speeds up) and `rate < 1.0` lengthens.
pub fn time_stretch(samples: &[f32], rate: f32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    // Sub-frame buffers cannot be phase-vocoded; fall back to a plain
    // linear-interpolation stretch.
    if samples.len() < FFT_SIZE * 2 {
        return linear_stretch(samples, rate);
    }

    let analysis_hop = SYNTHESIS_HOP as f64 * rate as f64;

    let mut planner = RealFftPlanner::<f32>::new();
    let forward_fft = planner.plan_fft_forward(FFT_SIZE);
    let inverse_fft = planner.plan_fft_inverse(FFT_SIZE);

    let window: Vec<f32> = (0..FFT_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos()))
        .collect();

    let bins = FFT_SIZE / 2 + 1;
    // Expected per-bin phase advance over one analysis hop
    let expected_advance: Vec<f32> = (0..bins)
        .map(|k| {
            (2.0 * std::f64::consts::PI * k as f64 / FFT_SIZE as f64 * analysis_hop) as f32
        })
        .collect();

    let n_frames = ((samples.len() - FFT_SIZE) as f64 / analysis_hop) as usize + 1;
    let out_len = (n_frames - 1) * SYNTHESIS_HOP + FFT_SIZE;

    let mut output = vec![0.0f32; out_len];
    let mut window_sum = vec![0.0f32; out_len];

    let mut prev_phase = vec![0.0f32; bins];
    let mut phase_acc = vec![0.0f32; bins];

    for frame_idx in 0..n_frames {
        let in_pos = (frame_idx as f64 * analysis_hop).round() as usize;
        if in_pos + FFT_SIZE > samples.len() {
            break;
        }

        let mut buffer: Vec<f32> = samples[in_pos..in_pos + FFT_SIZE]
            .iter()
            .zip(&window)
            .map(|(s, w)| s * w)
            .collect();

        let mut spectrum = forward_fft.make_output_vec();
        if forward_fft.process(&mut buffer, &mut spectrum).is_err() {
            break;
        }

        for k in 0..bins {
            let mag = spectrum[k].norm();
            let phase = spectrum[k].arg();

            if frame_idx == 0 {
                phase_acc[k] = phase;
            } else {
                // Deviation of the actual advance from the bin center
                let delta = wrap_phase(phase - prev_phase[k] - expected_advance[k]);
                let true_advance = expected_advance[k] + delta;
                // Re-accumulate at the synthesis hop
                phase_acc[k] =
                    wrap_phase(phase_acc[k] + true_advance / analysis_hop as f32 * SYNTHESIS_HOP as f32);
            }
            prev_phase[k] = phase;

            spectrum[k] = Complex::from_polar(mag, phase_acc[k]);
        }

        // DC and Nyquist bins of a real spectrum must stay purely real
        spectrum[0].im = 0.0;
        spectrum[bins - 1].im = 0.0;

        let mut time_buffer = inverse_fft.make_output_vec();
        if inverse_fft.process(&mut spectrum, &mut time_buffer).is_err() {
            break;
        }

        let out_pos = frame_idx * SYNTHESIS_HOP;
        let norm = 1.0 / FFT_SIZE as f32;
        for (i, sample) in time_buffer.iter().enumerate() {
            output[out_pos + i] += sample * norm * window[i];
            window_sum[out_pos + i] += window[i] * window[i];
        }
    }

    for (i, sample) in output.iter_mut().enumerate() {
        if window_sum[i] > 0.001 {
            *sample /= window_sum[i];
        }
    }

    output
}

/// Plain interpolation stretch for buffers too short for the vocoder.
fn linear_stretch(samples: &[f32], rate: f32) -> Vec<f32> {
    let out_len = ((samples.len() as f64 / rate as f64).round() as usize).max(1);
    (0..out_len)
        .map(|i| {
            let src = i as f64 * rate as f64;
            let idx = src as usize;
            let frac = (src - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Wrap a phase to (-pi, pi].
fn wrap_phase(phase: f32) -> f32 {
    use std::f32::consts::PI;
    let mut p = phase % (2.0 * PI);
    if p > PI {
        p -= 2.0 * PI;
    } else if p <= -PI {
        p += 2.0 * PI;
    }
    p
}

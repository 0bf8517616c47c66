//! Audio file I/O: symphonia decode to mono f32 at the target sample rate,
//! and hound WAV output for everything the pipeline persists.

use std::fs::File;
use std::path::Path;

use hound::{WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PipelineError, Result};

/// Decode an audio file to a mono f32 buffer at `target_rate`.
///
/// Multi-channel input is downmixed by averaging; any source sample rate is
/// accepted and resampled. Corrupt or unreadable input surfaces as an error
/// for the caller's per-file isolation to handle.
pub fn decode_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::NoAudioTrack(path.to_path_buf()))?;

    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut mono_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Mix to mono
        for chunk in sample_buf.samples().chunks(channels) {
            let mono = chunk.iter().sum::<f32>() / channels as f32;
            mono_samples.push(mono);
        }
    }

    if mono_samples.is_empty() {
        return Err(PipelineError::EmptyDecode(path.to_path_buf()));
    }

    resample(&mono_samples, source_rate, target_rate)
}

/// Sinc resample a mono buffer from `from_rate` to `to_rate` in one shot.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if from_rate == to_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)
        .map_err(|e| PipelineError::Resample(e.to_string()))?;

    let waves_in = vec![input.to_vec()];
    let mut waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| PipelineError::Resample(e.to_string()))?;

    Ok(waves_out.remove(0))
}

/// Write a mono f32 buffer as a 32-bit float WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&input, 16_000, 16_000).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn resample_48k_to_16k_thirds_the_length() {
        let input = vec![0.25_f32; 48_000];
        let out = resample(&input, 48_000, 16_000).unwrap();
        let expected = 16_000usize;
        assert!(
            out.len().abs_diff(expected) <= expected / 100,
            "expected ~{expected}, got {}",
            out.len()
        );
    }

    #[test]
    fn write_then_decode_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tone.wav");

        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.3)
            .collect();
        write_wav(&path, &samples, 16_000).unwrap();

        let decoded = decode_mono(&path, 16_000).unwrap();
        assert_eq!(decoded.len(), samples.len());
        // f32 WAV is lossless
        assert!((decoded[100] - samples[100]).abs() < 1e-6);
    }

    #[test]
    fn decode_resamples_and_downmixes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stereo48k.wav");

        let spec = WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..48_000 {
            let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48_000.0).sin() * 0.3;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_mono(&path, 16_000).unwrap();
        // 1 second of audio resampled to 16 kHz mono
        assert!(decoded.len().abs_diff(16_000) <= 160, "got {}", decoded.len());
    }

    #[test]
    fn decode_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("garbage.wav");
        std::fs::write(&path, b"this is not a wav file at all").unwrap();
        assert!(decode_mono(&path, 16_000).is_err());
    }
}

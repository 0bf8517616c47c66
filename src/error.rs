//! Error taxonomy for the gating pipeline.
//!
//! Per-file failures (decode, denoise, augment, write) are all representable
//! here; the batch runner folds them into `status=Error` report rows instead
//! of aborting the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("decoded no samples from {0}")]
    EmptyDecode(PathBuf),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio trimmed to silence (no frames above the trim threshold)")]
    TrimmedToSilence,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("file processing timed out after {0}s")]
    Timeout(u64),

    #[error("processing abandoned after timeout; writes skipped")]
    Abandoned,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

//! Audio quality gating and augmentation pipeline.
//!
//! A batch of raw recordings is decoded to mono 16 kHz, measured for
//! duration, SNR and clipping, and routed by configurable thresholds: failing
//! files land in quarantine tagged with their failure reasons, passing files
//! get a denoised reference copy plus randomized augmented variants. Every
//! file contributes exactly one row to a per-run CSV quality report.

pub mod audio_io;
pub mod augment;
pub mod classify;
pub mod config;
pub mod denoise;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod server;

pub use classify::FailureReason;
pub use config::{PipelineConfig, QualityThresholds};
pub use error::{PipelineError, Result};
pub use metrics::QualityMetrics;
pub use pipeline::run_batch;
pub use report::{Report, ReportRecord, Verdict};

//! Thin HTTP trigger surface for the pipeline.
//!
//! `POST /process` runs one batch over the raw directory and returns the
//! aggregate counts; `GET /stats` reports dataset composition, deriving the
//! top failure reasons from quarantine filenames via the shared
//! encode/decode pair in [`crate::classify`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;

use crate::classify;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline;
use crate::report::{round2, Verdict};

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    /// Cooperative cancellation flag handed to batch runs.
    pub cancel: Arc<AtomicBool>,
    /// Serializes batch runs; concurrent triggers would race on the report
    /// artifact and the output directories.
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/process", post(process))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "audiogate pipeline running" }))
}

#[derive(Debug, Serialize)]
struct ProcessSummary {
    total_files: usize,
    approved: usize,
    quarantined: usize,
}

async fn process(State(state): State<AppState>) -> Response {
    let _guard = state.run_lock.lock().await;

    match pipeline::run_batch(state.config.clone(), state.cancel.clone()).await {
        Ok(report) => Json(ProcessSummary {
            total_files: report.total(),
            approved: report.count(Verdict::Approved),
            quarantined: report.count(Verdict::Quarantined),
        })
        .into_response(),
        Err(e) => {
            log::error!("batch run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub raw_files: usize,
    pub clean_files: usize,
    pub clean_pct: f64,
    pub quarantined_files: usize,
    pub quarantine_pct: f64,
    pub augmented_files: usize,
    pub top_failure_reasons: Vec<(String, usize)>,
}

async fn stats(State(state): State<AppState>) -> Response {
    match dataset_stats(&state.config) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Directory counts, percentages, and the five most frequent failure
/// reasons decoded from quarantine filenames.
pub fn dataset_stats(config: &PipelineConfig) -> Result<StatsResponse> {
    let raw_files = count_files(&config.raw_dir)?;
    let clean_files = count_files(&config.clean_dir)?;
    let quarantined_files = count_files(&config.quarantine_dir)?;
    let augmented_files = count_files(&config.augmented_dir)?;

    let pct = |n: usize| {
        if raw_files > 0 {
            round2(n as f64 / raw_files as f64 * 100.0)
        } else {
            0.0
        }
    };

    Ok(StatsResponse {
        raw_files,
        clean_files,
        clean_pct: pct(clean_files),
        quarantined_files,
        quarantine_pct: pct(quarantined_files),
        augmented_files,
        top_failure_reasons: top_failure_reasons(&config.quarantine_dir, 5)?,
    })
}

fn count_files(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    Ok(std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .count())
}

/// Tally failure reasons across all quarantine filenames, most frequent
/// first (ties broken by name for stable output).
fn top_failure_reasons(quarantine_dir: &Path, limit: usize) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();

    if quarantine_dir.exists() {
        for entry in std::fs::read_dir(quarantine_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".wav") {
                continue;
            }
            for reason in classify::reasons_from_file_name(&name) {
                *counts.entry(reason.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut tally: Vec<(String, usize)> =
        counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tally.truncate(limit);
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_in(base: &Path) -> PipelineConfig {
        PipelineConfig {
            raw_dir: base.join("raw"),
            clean_dir: base.join("clean"),
            quarantine_dir: base.join("quarantine"),
            augmented_dir: base.join("augmented"),
            report_path: base.join("reports").join("quality_report.csv"),
            ..Default::default()
        }
    }

    #[test]
    fn stats_on_missing_dirs_are_all_zero() {
        let cfg = config_in(&PathBuf::from("/nonexistent/audiogate-test"));
        let stats = dataset_stats(&cfg).unwrap();
        assert_eq!(stats.raw_files, 0);
        assert_eq!(stats.clean_pct, 0.0);
        assert!(stats.top_failure_reasons.is_empty());
    }

    #[test]
    fn stats_count_files_and_percentages() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path());
        cfg.ensure_directories().unwrap();

        for name in ["a.wav", "b.wav", "c.wav", "d.wav"] {
            std::fs::write(cfg.raw_dir.join(name), b"x").unwrap();
        }
        std::fs::write(cfg.clean_dir.join("a.wav"), b"x").unwrap();
        std::fs::write(cfg.quarantine_dir.join("b_TooShort.wav"), b"x").unwrap();

        let stats = dataset_stats(&cfg).unwrap();
        assert_eq!(stats.raw_files, 4);
        assert_eq!(stats.clean_pct, 25.0);
        assert_eq!(stats.quarantine_pct, 25.0);
    }

    #[test]
    fn top_reasons_aggregate_across_filenames() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "a_TooShort.wav",
            "b_TooShort_LowSNR.wav",
            "c_LowSNR.wav",
            "d_TooShort_Clipping.wav",
            "notes.txt",
        ] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }

        let top = top_failure_reasons(tmp.path(), 5).unwrap();
        assert_eq!(top[0], ("TooShort".to_string(), 3));
        assert_eq!(top[1], ("LowSNR".to_string(), 2));
        assert_eq!(top[2], ("Clipping".to_string(), 1));
    }

    #[test]
    fn router_builds() {
        let state = AppState::new(Arc::new(PipelineConfig::default()));
        let _router = build_router(state);
    }
}

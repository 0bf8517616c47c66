//! Batch orchestration: discover raw inputs, gate each file on a blocking
//! worker, route the audio by verdict, and assemble the per-run report.
//!
//! Files are independent, so each one runs its full extract → classify →
//! (denoise → augment) → write sequence on its own `spawn_blocking` task.
//! Results are awaited in discovery order, which keeps the persisted report
//! deterministic. A failing file never aborts the batch: its error is folded
//! into a single `status=Error` row and the run continues.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio_io;
use crate::augment::{Augmenter, NUM_VARIANTS};
use crate::classify;
use crate::config::PipelineConfig;
use crate::denoise;
use crate::error::{PipelineError, Result};
use crate::metrics::QualityMetrics;
use crate::report::{Report, ReportRecord, Verdict};

/// Run one full batch over every `.wav` file currently in the raw directory.
///
/// Returns the report after persisting it to `config.report_path`. The
/// `cancel` flag is honored between files: workers that have not started
/// when it flips record a cancellation error instead of processing.
pub async fn run_batch(config: Arc<PipelineConfig>, cancel: Arc<AtomicBool>) -> Result<Report> {
    let files = discover_inputs(&config.raw_dir)?;

    if files.is_empty() {
        log::warn!(
            "no .wav files found in {} — writing empty report",
            config.raw_dir.display()
        );
        let report = Report::default();
        report.write_csv(&config.report_path)?;
        return Ok(report);
    }

    log::info!(
        "gating {} files from {}",
        files.len(),
        config.raw_dir.display()
    );

    let timeout = Duration::from_secs(config.per_file_timeout_secs);

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let cfg = config.clone();
        let cancel = cancel.clone();
        let filename = display_name(&path);
        // Per-file flag: flipped when the awaiting side gives up on this
        // file, so the still-running worker stops before its next write
        let abort = Arc::new(AtomicBool::new(false));
        let worker_abort = abort.clone();
        let handle =
            tokio::task::spawn_blocking(move || process_file(&cfg, &cancel, &worker_abort, &path));
        handles.push((filename, abort, handle));
    }

    let mut records = Vec::with_capacity(handles.len());
    for (filename, abort, handle) in handles {
        let record = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(record)) => record,
            Ok(Err(join_err)) => {
                log::error!("{}: worker panicked: {}", filename, join_err);
                ReportRecord::failed(filename, format!("worker panicked: {join_err}"))
            }
            Err(_) => {
                // The blocking worker cannot be interrupted mid-computation;
                // the flag keeps it from persisting artifacts for a file
                // already recorded as an error
                abort.store(true, Ordering::Relaxed);
                log::error!("{}: {}", filename, PipelineError::Timeout(config.per_file_timeout_secs));
                ReportRecord::failed(
                    filename,
                    PipelineError::Timeout(config.per_file_timeout_secs).to_string(),
                )
            }
        };
        records.push(record);
    }

    let report = Report { records };
    report.write_csv(&config.report_path)?;

    log::info!(
        "batch complete: {} total, {} approved, {} quarantined, {} errors",
        report.total(),
        report.count(Verdict::Approved),
        report.count(Verdict::Quarantined),
        report.count(Verdict::Error)
    );

    Ok(report)
}

/// `.wav` files in the raw directory, sorted by name so reruns and the
/// report order are reproducible.
fn discover_inputs(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(raw_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Full per-file pipeline. Never panics the batch: every failure becomes an
/// `Error` record.
fn process_file(
    config: &PipelineConfig,
    cancel: &AtomicBool,
    abort: &AtomicBool,
    path: &Path,
) -> ReportRecord {
    let filename = display_name(path);

    if cancel.load(Ordering::Relaxed) {
        return ReportRecord::failed(filename, "cancelled before processing".into());
    }

    match gate_file(config, abort, path) {
        Ok((verdict, metrics)) => {
            log::debug!("{}: {} ({:?})", filename, verdict, metrics);
            ReportRecord::measured(filename, verdict, &metrics)
        }
        Err(e) => {
            log::warn!("{}: {}", filename, e);
            ReportRecord::failed(filename, e.to_string())
        }
    }
}

/// Extract metrics, classify, and route one file. Returns the verdict and
/// metrics on success; any stage error (including write failures, which
/// degrade to per-file errors) propagates to the caller.
///
/// Once `abort` flips (the awaiting side timed this file out and already
/// recorded it as an error), no further artifact may be persisted.
fn gate_file(
    config: &PipelineConfig,
    abort: &AtomicBool,
    path: &Path,
) -> Result<(Verdict, QualityMetrics)> {
    let rate = config.sample_rate;
    let samples = audio_io::decode_mono(path, rate)?;
    let metrics = QualityMetrics::compute(&samples, rate);
    let reasons = classify::evaluate(&metrics, &config.thresholds);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_name(path));

    if !reasons.is_empty() {
        // Quarantine keeps the undenoised buffer, tagged with the reasons
        let out_name = classify::quarantine_file_name(&stem, &reasons);
        write_unless_abandoned(abort, &config.quarantine_dir.join(out_name), &samples, rate)?;
        return Ok((Verdict::Quarantined, metrics));
    }

    let cleaned = denoise::clean(&samples)?;

    write_unless_abandoned(abort, &config.clean_dir.join(display_name(path)), &cleaned, rate)?;
    write_unless_abandoned(
        abort,
        &config.augmented_dir.join(format!("{stem}_orig.wav")),
        &cleaned,
        rate,
    )?;

    let mut augmenter = Augmenter::new(rate, config.augment_seed);
    for i in 0..NUM_VARIANTS {
        let variant = augmenter.variant(&cleaned)?;
        write_unless_abandoned(
            abort,
            &config.augmented_dir.join(format!("{stem}_aug_{i}.wav")),
            &variant,
            rate,
        )?;
    }

    Ok((Verdict::Approved, metrics))
}

/// Gate every artifact write on the per-file abort flag, so a worker that
/// outlived its timeout leaves no outputs behind its `Error` report row.
fn write_unless_abandoned(
    abort: &AtomicBool,
    path: &Path,
    samples: &[f32],
    rate: u32,
) -> Result<()> {
    if abort.load(Ordering::Relaxed) {
        return Err(PipelineError::Abandoned);
    }
    audio_io::write_wav(path, samples, rate)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.wav", "a.WAV", "notes.txt", "c.wav"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub.wav")).unwrap();

        let files = discover_inputs(tmp.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.WAV", "b.wav", "c.wav"]);
    }

    #[test]
    fn discovery_of_empty_dir_is_empty_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_inputs(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn cancelled_worker_records_error_without_touching_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            raw_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let cancel = AtomicBool::new(true);
        let abort = AtomicBool::new(false);

        let record = process_file(&cfg, &cancel, &abort, &tmp.path().join("x.wav"));
        assert_eq!(record.status, Verdict::Error);
        assert!(record.error.as_deref().unwrap().contains("cancelled"));
    }

    #[test]
    fn abandoned_file_writes_no_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        let cfg = PipelineConfig {
            raw_dir: base.join("raw"),
            clean_dir: base.join("clean"),
            quarantine_dir: base.join("quarantine"),
            augmented_dir: base.join("augmented"),
            report_path: base.join("reports").join("quality_report.csv"),
            ..Default::default()
        };
        cfg.ensure_directories().unwrap();

        let path = cfg.raw_dir.join("slow.wav");
        let samples: Vec<f32> = (0..80_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.5)
            .collect();
        audio_io::write_wav(&path, &samples, cfg.sample_rate).unwrap();

        // The awaiting side already gave up on this file
        let abort = AtomicBool::new(true);
        let err = gate_file(&cfg, &abort, &path).unwrap_err();
        assert!(matches!(err, PipelineError::Abandoned));

        for dir in [&cfg.clean_dir, &cfg.quarantine_dir, &cfg.augmented_dir] {
            assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0, "{}", dir.display());
        }
    }
}

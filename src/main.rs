use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use audiogate::config::PipelineConfig;
use audiogate::server::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "audiogate", about = "Audio quality gating and augmentation pipeline")]
struct Args {
    /// Path to a TOML config file; defaults apply when omitted.
    #[arg(long, env = "AUDIOGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address the trigger/stats API listens on.
    #[arg(long, env = "AUDIOGATE_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    // Directory creation is an explicit startup step, not a side effect of
    // loading the config or running a batch.
    config.ensure_directories()?;
    log::info!(
        "directories ready (raw: {}, report: {})",
        config.raw_dir.display(),
        config.report_path.display()
    );

    let state = AppState::new(Arc::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    log::info!("audiogate listening on http://{}", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}

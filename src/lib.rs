//! Screen recorder core - capture, mix, record and hand off.
//!
//! This is the main library crate of the recorder. It acquires screen,
//! camera and microphone streams, mixes their audio, records the combined
//! stream in chunks and hands the finished recording to the upload flow.

pub mod capture;
pub mod commands;
pub mod handoff;
pub mod recorder;
pub mod utils;

use anyhow::Context;
use capture::{RecordingMode, SimulatedPlatform};
use commands::recording::RecorderHandle;
use handoff::MemorySessionStorage;
use recorder::{Platform, RecorderConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber. Later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recording_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run a headless record, stop and handoff cycle on the simulated platform.
///
/// Arguments: `[mode] [config.json]`.
pub fn run() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting screen recorder v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let mode: RecordingMode = match args.next() {
        Some(mode) => mode.parse().map_err(anyhow::Error::msg)?,
        None => RecordingMode::default(),
    };
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {path}"))?;
            RecorderConfig::from_json_str(&json).context("Invalid recorder config")?
        }
        None => RecorderConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    runtime.block_on(record_once(mode, config))
}

async fn record_once(mode: RecordingMode, config: RecorderConfig) -> anyhow::Result<()> {
    let platform = SimulatedPlatform::new();
    let timeslice = config.timeslice();
    let state = RecorderHandle::new(
        Platform::simulated(&platform),
        config,
        Arc::new(MemorySessionStorage::new()),
    );

    commands::recording::start_recording(&state, &mode.to_string(), true)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))?;
    tokio::time::sleep(timeslice * 3 + Duration::from_millis(100)).await;
    let summary = commands::recording::stop_recording(&state)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))?;
    tracing::info!("{}", serde_json::to_string(&summary)?);

    let record = commands::recording::continue_to_upload(&state)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))?;
    tracing::info!("Handoff: {}", serde_json::to_string(&record)?);

    if let Some(file) = commands::recording::load_recorded_video(&state)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))?
    {
        let path = file.write_to(&std::env::temp_dir())?;
        tracing::info!("Recording available at {:?}", path);
    }
    Ok(())
}

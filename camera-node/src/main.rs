mod cli;
mod controller;

use anyhow::{Context, Result};
use clap::Parser;
use config_manager::SettingsStore;
use hls_server::HlsState;
use recording_store::StorageJanitor;
use std::net::SocketAddr;
use std::sync::Arc;
use stream_pipeline::{CaptureConfig, PipelineOutputs, PipelinePlan};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::controller::Controller;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let layout = cli.layout().context("Failed to resolve data directory")?;
    layout.ensure().context("Failed to create data directories")?;

    let settings = SettingsStore::new(layout.settings_path.clone());
    settings.seed().context("Failed to seed camera settings")?;

    tracing::info!("Camera node starting");
    tracing::info!("  Recordings: {}", layout.storage_dir.display());
    tracing::info!("  Live segments: {}", layout.segments_dir.display());
    tracing::info!("  Settings: {}", layout.settings_path.display());

    let shutdown = CancellationToken::new();

    // Storage janitor
    let janitor = StorageJanitor::new(&layout.storage_dir, cli.quota()).with_interval(cli.janitor_interval());
    let janitor_task = tokio::spawn(janitor.run(shutdown.child_token()));

    // Web server
    let (restart_tx, restart_rx) = mpsc::channel(1);
    let state = Arc::new(HlsState::new(layout.clone(), cli.vod_tools(), restart_tx));
    let app = hls_server::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Web server listening on {}", addr);

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    // Signals
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(name) => {
                tracing::info!("Received {}, shutting down...", name);
                signal_shutdown.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for shutdown signals: {}", e),
        }
    });

    // Capture pipeline
    let defaults = cli.camera_defaults();
    let tools = cli.toolchain();
    let outputs = PipelineOutputs {
        archive_dir: Some(layout.storage_dir.clone()),
        live_dir: Some(layout.segments_dir.clone()),
    };
    let build_plan = move || {
        let camera = settings.load_or_default();
        let config = CaptureConfig::from_settings(&camera, &defaults);
        tracing::info!(
            "Camera: {}x{} @ {} fps, rotation {}{}",
            config.width,
            config.height,
            config.framerate,
            config.rotation.degrees(),
            if config.flip { ", flipped" } else { "" }
        );
        PipelinePlan::for_camera(&config, &outputs, &tools)
    };

    let result = Controller::new(build_plan, cli.on_failure, restart_rx)
        .run(shutdown.clone())
        .await;

    shutdown.cancel();
    if let Err(e) = janitor_task.await {
        tracing::warn!("Janitor task failed: {}", e);
    }
    match server_task.await {
        Ok(Ok(())) => tracing::info!("Web server stopped"),
        Ok(Err(e)) => tracing::warn!("Web server error: {}", e),
        Err(e) => tracing::warn!("Web server task failed: {}", e),
    }

    result.context("Capture pipeline failed")
}

/// Resolve on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

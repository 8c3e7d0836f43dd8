//! Media Arbiter (mediarb) - Main entry point
//!
//! Loads the configuration and every clip, starts the audio output, enters
//! the initial state (default language, default track playing) and serves
//! OSC commands until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mediarb::arbiter::DEFAULT_QUEUE_CAPACITY;
use mediarb::audio::OutputThread;
use mediarb::server::ControlServer;
use mediarb::status::{StatusReporter, StdoutReporter};
use mediarb::video::{resolve_player, ProcessLauncher};
use mediarb::Arbiter;
use mediarb_common::config::{load_config, AudioBackend};
use mediarb_common::Router;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mediarb
#[derive(Parser, Debug)]
#[command(name = "mediarb")]
#[command(about = "Network-controlled media arbiter")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control channel bind address (overrides config)
    #[arg(long, env = "MEDIARB_HOST")]
    host: Option<String>,

    /// Control channel UDP port (overrides config)
    #[arg(short, long, env = "MEDIARB_PORT")]
    port: Option<u16>,

    /// Video player executable (overrides config)
    #[arg(long, env = "MEDIARB_PLAYER")]
    player: Option<PathBuf>,

    /// Render audio without an output device
    #[arg(long)]
    null_audio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging is initialized, so its own messages use
    // the default filter
    let loaded = load_config(args.config.as_deref());
    let level = loaded
        .as_ref()
        .map(|(config, _)| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mediarb={level},mediarb_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "mediarb {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (mut config, source) = loaded.context("Failed to load configuration")?;
    info!("Configuration: {}", source);

    // Command-line overrides
    if let Some(host) = args.host {
        config.control.host = host;
    }
    if let Some(port) = args.port {
        config.control.port = port;
    }
    if let Some(player) = args.player {
        config.player = player;
    }
    if args.null_audio {
        config.audio.backend = AudioBackend::Null;
    }

    config.player = resolve_player(&config.player).context("Video player unavailable")?;
    info!("Video player: {}", config.player.display());

    let mut output = OutputThread::start(
        config.audio.backend,
        config.audio.device.clone(),
        config.gain(),
    )
    .context("Failed to start audio output")?;

    let reporter: Arc<dyn StatusReporter> = Arc::new(StdoutReporter);
    let router = Router::from_config(&config);
    let control_addr = config.control_addr();

    let arbiter = Arc::new(
        Arbiter::start(
            config,
            output.mixer().clone(),
            Arc::new(ProcessLauncher),
            Arc::clone(&reporter),
        )
        .await
        .context("Failed to initialize arbiter")?,
    );

    let (queue, worker) = arbiter.spawn_worker(DEFAULT_QUEUE_CAPACITY);

    let server = ControlServer::bind(&control_addr, router, queue, reporter)
        .await
        .context("Failed to start control channel")?;

    server
        .run(shutdown_signal())
        .await
        .context("Control channel error")?;

    // No further commands; cut short whatever is playing
    worker.abort();
    arbiter.shutdown().await;
    if output.has_error() {
        warn!("Audio output reported errors during the session");
    }
    output.stop();

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

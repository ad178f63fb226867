//! Barcode gateway - turns barcode scans into Grocy inventory actions
//!
//! Module structure:
//! - `domain/` - Core types (modes, overrides, key events, products, reports)
//! - `io/` - External interfaces (Grocy, HID/serial scanners, replay, HTTP control)
//! - `services/` - Scan logic (decoder, interpreter, quantity, dispatcher, worker)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use barcode_gateway::infra::{Config, LogFormat, Metrics, ScannerSource};
use barcode_gateway::io::{
    run_replay, start_control_server, ControlContext, FeedbackSink, GrocyClient, GrocyOptions,
    HidListener, SerialListener, TracingFeedback,
};
use barcode_gateway::services::{create_scan_worker, Inventory, ScanProcessor};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// How long the scan worker gets to drain its queue on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long a scanner listener gets to release its device on shutdown
const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Barcode gateway - scanner driven Grocy inventory control
#[derive(Parser, Debug)]
#[command(name = "barcode-gateway", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

fn init_tracing(config: &Config) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    match config.log_format() {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(UtcTime::rfc_3339())
            .with_target(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref());

    init_tracing(&config);
    info!(version = env!("GIT_HASH"), "barcode-gateway starting");

    config.validate().context("invalid configuration")?;

    info!(
        config_file = %config.config_file(),
        source = ?config.scanner_source(),
        device = %config.scanner_device(),
        timeout_ms = %config.scanner_timeout_ms(),
        default_mode = %config.default_mode(),
        test_mode = %config.test_mode(),
        api_url = %config.api_url(),
        control_port = %config.control_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let feedback: Arc<dyn FeedbackSink> = Arc::new(TracingFeedback);
    let inventory: Arc<dyn Inventory> = Arc::new(
        GrocyClient::new(GrocyOptions::from_config(&config))
            .context("failed to build inventory client")?,
    );

    // Scan worker owns the session state; every input source feeds it
    let processor =
        ScanProcessor::new(config.default_mode(), inventory, feedback.clone(), metrics.clone());
    let (scan_input, worker, state_rx) =
        create_scan_worker(processor, feedback, metrics.clone(), config.test_mode());
    let worker_handle = tokio::spawn(worker.run());

    let mut listener_handle = None;
    let replay_handle = match config.scanner_source() {
        ScannerSource::Hid => {
            let listener = HidListener::new(&config, scan_input.clone(), metrics.clone());
            listener_handle = Some(tokio::spawn(listener.run(shutdown_rx.clone())));
            None
        }
        ScannerSource::Serial => {
            let listener = SerialListener::new(&config, scan_input.clone(), metrics.clone());
            listener_handle = Some(tokio::spawn(listener.run(shutdown_rx.clone())));
            None
        }
        ScannerSource::Replay => {
            let path = config
                .replay_file()
                .context("scanner.source = \"replay\" requires scanner.replay_file")?
                .to_string();
            let timeout = Duration::from_millis(config.scanner_timeout_ms());
            let input = scan_input.clone();
            let replay_metrics = metrics.clone();
            Some(tokio::spawn(async move { run_replay(path, timeout, input, replay_metrics).await }))
        }
        ScannerSource::None => {
            info!("scanner_input_disabled");
            None
        }
    };

    // Control HTTP server (if port > 0)
    let control_port = config.control_port();
    if control_port > 0 {
        let ctx = ControlContext {
            input: scan_input.clone(),
            state: state_rx,
            metrics: metrics.clone(),
            version: env!("GIT_HASH"),
            started_at: chrono::Utc::now(),
        };
        let control_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = start_control_server(control_port, ctx, control_shutdown).await {
                error!(error = %e, "control_server_error");
            }
        });
    }

    // Periodic metrics summary (interval 0 disables)
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics_clone = metrics.clone();
        let mut metrics_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => metrics_clone.report().log(),
                    _ = metrics_shutdown.changed() => break,
                }
            }
        });
    }

    // The worker stops once every input handle is gone
    drop(scan_input);
    drop(shutdown_rx);

    match replay_handle {
        Some(handle) => {
            tokio::select! {
                result = handle => match result {
                    Ok(Ok(count)) => info!(processed = count, "replay_complete"),
                    Ok(Err(e)) => error!(error = %format!("{:#}", e), "replay_failed"),
                    Err(e) => error!(error = %e, "replay_task_failed"),
                },
                _ = tokio::signal::ctrl_c() => info!("shutdown_signal_received"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown_signal_received");
        }
    }

    let _ = shutdown_tx.send(true);

    if let Some(handle) = listener_handle {
        match tokio::time::timeout(LISTENER_JOIN_TIMEOUT, handle).await {
            Ok(_) => info!("scanner_listener_joined"),
            Err(_) => {
                warn!(timeout_ms = LISTENER_JOIN_TIMEOUT.as_millis() as u64, "scanner_listener_join_timeout")
            }
        }
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, worker_handle).await {
        Ok(_) => info!("scan_worker_drained"),
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "scan_worker_drain_timeout"),
    }

    metrics.report().log();
    info!("barcode-gateway shutdown complete");
    Ok(())
}

//! HTTP control surface
//!
//! - `POST /api/scan`   simulate a scan (test mode only)
//! - `GET  /api/status` current mode, overrides and test-mode flag
//! - `GET  /health`     liveness
//! - `GET  /metrics`    Prometheus text format

use crate::domain::types::SessionState;
use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::services::scan_worker::{ScanInput, SubmitError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared state handed to every request
pub struct ControlContext {
    pub input: ScanInput,
    pub state: watch::Receiver<SessionState>,
    pub metrics: Arc<Metrics>,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ScanBody {
    #[serde(default)]
    barcode: Option<String>,
}

/// Extract a non-blank barcode from a `/api/scan` body
pub fn parse_scan_body(body: &[u8]) -> Option<String> {
    let parsed: ScanBody = serde_json::from_slice(body).ok()?;
    parsed.barcode.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}

enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {cumulative}");
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let mut output = String::with_capacity(4096);

    let counters: [(&str, &str, u64); 11] = [
        ("scanner_scans_total", "Barcodes submitted for processing", summary.scans_received),
        ("scanner_scans_simulated_total", "Barcodes injected through the API", summary.scans_simulated),
        ("scanner_scans_dropped_total", "Barcodes dropped due to full queue", summary.scans_dropped),
        ("scanner_decode_timeouts_total", "Barcodes completed by inactivity timeout", summary.decode_timeouts),
        ("scanner_actions_succeeded_total", "Inventory actions that succeeded", summary.actions_succeeded),
        ("scanner_actions_failed_total", "Inventory actions that failed", summary.actions_failed),
        ("scanner_unknown_products_total", "Scans of barcodes unknown to the inventory", summary.unknown_products),
        ("scanner_products_created_total", "Products created from the external catalog", summary.products_created),
        ("scanner_creation_failures_total", "Product creations that failed", summary.creation_failures),
        ("scanner_inventory_errors_total", "Inventory requests that errored", summary.inventory_errors),
        ("scanner_processing_errors_total", "Scans that ended in a processing error", summary.processing_errors),
    ];
    for (name, help, val) in counters {
        write_metric(&mut output, name, help, MetricType::Counter, val);
    }

    write_histogram(
        &mut output,
        "scanner_inventory_latency_ms",
        "Inventory request latency in milliseconds",
        &summary.inventory_latency_buckets,
        summary.inventory_latency_sum_ms,
    );
    write_metric(
        &mut output,
        "scanner_inventory_latency_max_ms",
        "Maximum inventory request latency",
        MetricType::Gauge,
        summary.inventory_latency_max_ms,
    );
    write_metric(
        &mut output,
        "scanner_uptime_seconds",
        "Seconds since start",
        MetricType::Gauge,
        summary.uptime_secs,
    );

    output
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("static response should not fail")
}

async fn handle_scan(
    req: Request<hyper::body::Incoming>,
    ctx: &ControlContext,
) -> Response<Full<Bytes>> {
    if !ctx.input.simulation_enabled() {
        return json_response(
            StatusCode::FORBIDDEN,
            json!({"ok": false, "error": SubmitError::SimulationDisabled.to_string()}),
        );
    }

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "control_body_read_failed");
            return json_response(StatusCode::BAD_REQUEST, json!({"ok": false, "error": "unreadable body"}));
        }
    };

    let Some(barcode) = parse_scan_body(&body) else {
        return json_response(StatusCode::BAD_REQUEST, json!({"ok": false, "error": "barcode is required"}));
    };

    match ctx.input.simulate(&barcode).await {
        Ok(report) => json_response(StatusCode::OK, json!({"ok": true, "report": report})),
        Err(SubmitError::SimulationDisabled) => json_response(
            StatusCode::FORBIDDEN,
            json!({"ok": false, "error": SubmitError::SimulationDisabled.to_string()}),
        ),
        Err(e) => {
            error!(barcode = %barcode, error = %e, "control_scan_failed");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"ok": false, "error": e.to_string()}))
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    ctx: Arc<ControlContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/api/scan") => Ok(handle_scan(req, &ctx).await),
        (&Method::GET, "/api/status") => {
            let state = ctx.state.borrow().clone();
            Ok(json_response(
                StatusCode::OK,
                json!({
                    "running": true,
                    "mode": state.mode,
                    "overrides": state.overrides,
                    "test_mode": ctx.input.simulation_enabled(),
                    "version": ctx.version,
                    "started_at": ctx.started_at.to_rfc3339(),
                }),
            ))
        }
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&ctx.metrics.report());
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        // CORS preflight for api/scan
        (&Method::OPTIONS, "/api/scan") => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Full::new(Bytes::from("")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the control HTTP server
pub async fn start_control_server(
    port: u16,
    ctx: ControlContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let ctx = Arc::new(ctx);

    info!(port = %port, test_mode = ctx.input.simulation_enabled(), "control_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let ctx = ctx.clone();
                                async move { handle_request(req, ctx).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "control_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "control_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("control_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

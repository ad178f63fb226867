//! Scan worker - single-writer actor around the scan processor
//!
//! Both the physical listener and the control surface submit barcodes over
//! one bounded mpsc channel, so session state has exactly one owner and
//! barcodes are processed strictly in arrival order. The worker publishes a
//! `SessionState` snapshot on a watch channel after every scan.

use crate::domain::types::{ScanReport, SessionState};
use crate::infra::metrics::Metrics;
use crate::io::feedback::{FeedbackEvent, FeedbackSink};
use crate::services::processor::ScanProcessor;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Queue depth between input sources and the worker
pub const SCAN_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrigin {
    Scanner,
    Simulated,
    Replay,
}

impl ScanOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOrigin::Scanner => "scanner",
            ScanOrigin::Simulated => "simulated",
            ScanOrigin::Replay => "replay",
        }
    }
}

/// Time-ordered id correlating one barcode across log events
pub fn new_scan_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Debug)]
pub struct ScanRequest {
    pub id: String,
    pub barcode: String,
    pub origin: ScanOrigin,
    pub enqueued_at: Instant,
    /// Present when the submitter waits for the report
    pub reply: Option<oneshot::Sender<Result<ScanReport, String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("simulation is only available in test mode")]
    SimulationDisabled,
    #[error("scan queue full")]
    QueueFull,
    #[error("scan worker stopped")]
    WorkerStopped,
    #[error("{0}")]
    Processing(String),
}

/// Cloneable handle used by every input source
#[derive(Clone)]
pub struct ScanInput {
    tx: mpsc::Sender<ScanRequest>,
    metrics: Arc<Metrics>,
    simulation_enabled: bool,
}

impl ScanInput {
    pub fn simulation_enabled(&self) -> bool {
        self.simulation_enabled
    }

    /// Fire-and-forget submit; never blocks the caller's read loop
    pub fn submit(&self, barcode: String, origin: ScanOrigin) -> Result<(), SubmitError> {
        let request = ScanRequest {
            id: new_scan_id(),
            barcode,
            origin,
            enqueued_at: Instant::now(),
            reply: None,
        };
        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics.record_scan(origin == ScanOrigin::Simulated);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(req)) => {
                self.metrics.record_scan_dropped();
                warn!(
                    scan_id = %req.id,
                    barcode = %req.barcode,
                    origin = req.origin.as_str(),
                    "scan_dropped_queue_full"
                );
                Err(SubmitError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubmitError::WorkerStopped),
        }
    }

    /// Submit and wait for the processed report
    pub async fn process(&self, barcode: String, origin: ScanOrigin) -> Result<ScanReport, SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ScanRequest {
            id: new_scan_id(),
            barcode,
            origin,
            enqueued_at: Instant::now(),
            reply: Some(reply_tx),
        };
        self.tx.send(request).await.map_err(|_| SubmitError::WorkerStopped)?;
        self.metrics.record_scan(origin == ScanOrigin::Simulated);
        match reply_rx.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(message)) => Err(SubmitError::Processing(message)),
            Err(_) => Err(SubmitError::WorkerStopped),
        }
    }

    /// Inject a barcode as if it had been scanned. Test mode only.
    pub async fn simulate(&self, barcode: &str) -> Result<ScanReport, SubmitError> {
        if !self.simulation_enabled {
            warn!(barcode = %barcode, "simulation_rejected");
            return Err(SubmitError::SimulationDisabled);
        }
        info!(barcode = %barcode, "simulated_scan");
        self.process(barcode.to_string(), ScanOrigin::Simulated).await
    }
}

pub struct ScanWorker {
    processor: ScanProcessor,
    rx: mpsc::Receiver<ScanRequest>,
    state_tx: watch::Sender<SessionState>,
    feedback: Arc<dyn FeedbackSink>,
    metrics: Arc<Metrics>,
}

impl ScanWorker {
    /// Run until every `ScanInput` has been dropped
    pub async fn run(mut self) {
        info!(mode = %self.processor.state().mode, "scan_worker_started");

        while let Some(request) = self.rx.recv().await {
            let queue_delay_us = request.enqueued_at.elapsed().as_micros() as u64;
            debug!(
                scan_id = %request.id,
                barcode = %request.barcode,
                origin = request.origin.as_str(),
                queue_delay_us = %queue_delay_us,
                "scan_dequeued"
            );

            let outcome = match self.processor.process(&request.barcode).await {
                Ok(report) => {
                    info!(
                        scan_id = %request.id,
                        barcode = %request.barcode,
                        mode = %report.mode,
                        kind = ?report.kind,
                        success = report.result.success,
                        message = %report.result.message,
                        "scan_complete"
                    );
                    Ok(report)
                }
                Err(e) => {
                    self.metrics.record_processing_error();
                    error!(scan_id = %request.id, barcode = %request.barcode, error = %e, "scan_failed");
                    self.feedback.emit(FeedbackEvent::Error(e.to_string()));
                    Err(e.to_string())
                }
            };

            self.state_tx.send_replace(self.processor.state().clone());

            if let Some(reply) = request.reply {
                let _ = reply.send(outcome);
            }
        }

        info!("scan_worker_stopped");
    }
}

/// Create the worker, its input handle and the session state watch
pub fn create_scan_worker(
    processor: ScanProcessor,
    feedback: Arc<dyn FeedbackSink>,
    metrics: Arc<Metrics>,
    simulation_enabled: bool,
) -> (ScanInput, ScanWorker, watch::Receiver<SessionState>) {
    let (tx, rx) = mpsc::channel(SCAN_QUEUE_CAPACITY);
    let (state_tx, state_rx) = watch::channel(processor.state().clone());
    let input = ScanInput { tx, metrics: metrics.clone(), simulation_enabled };
    let worker = ScanWorker { processor, rx, state_tx, feedback, metrics };
    (input, worker, state_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_ids_are_unique() {
        let first = new_scan_id();
        let second = new_scan_id();
        assert_eq!(first.len(), 36);
        assert_ne!(first, second);
    }
}

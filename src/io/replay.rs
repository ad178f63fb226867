//! Replay input - types barcodes from a text file through the decoder
//!
//! Each non-empty line becomes key presses (via the HID keymap) followed by
//! Enter, so replayed scans behave exactly like a keyboard-mode scanner,
//! lowercasing included.

use crate::domain::keymap::{code_for_char, key_input, KEY_ENTER};
use crate::domain::types::{KeyInput, KeyState};
use crate::infra::metrics::Metrics;
use crate::io::key_stream::KeyStream;
use crate::services::scan_worker::{ScanInput, ScanOrigin};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Key sequence a keyboard-mode scanner would send for `line`
pub fn events_for_line(line: &str) -> Vec<KeyInput> {
    let mut keys: Vec<KeyInput> = line
        .trim()
        .chars()
        .filter_map(|c| match code_for_char(c) {
            Some(code) => Some(key_input(code)),
            None => {
                warn!(character = %c, "replay_unmapped_character");
                None
            }
        })
        .collect();
    keys.push(key_input(KEY_ENTER));
    keys
}

/// Replay every line of `path`, waiting for each scan to finish.
/// Returns the number of barcodes processed.
pub async fn run_replay(
    path: impl AsRef<Path>,
    timeout: Duration,
    input: ScanInput,
    metrics: Arc<Metrics>,
) -> anyhow::Result<usize> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read replay file {}", path.display()))?;

    info!(file = %path.display(), "replay_started");
    let mut stream = KeyStream::new(timeout, metrics);
    let mut processed = 0usize;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        for key in events_for_line(line) {
            let Some(barcode) = stream.key(key, KeyState::Press) else {
                stream.key(key, KeyState::Release);
                continue;
            };
            match input.process(barcode.clone(), ScanOrigin::Replay).await {
                Ok(report) => {
                    info!(
                        barcode = %barcode,
                        success = report.result.success,
                        message = %report.result.message,
                        "replay_scan"
                    );
                }
                Err(e) => warn!(barcode = %barcode, error = %e, "replay_scan_failed"),
            }
            processed += 1;
        }
    }

    info!(file = %path.display(), processed = processed, "replay_finished");
    Ok(processed)
}

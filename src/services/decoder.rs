//! Key event decoder - reassembles key presses into barcode strings
//!
//! A barcode is complete when the terminator (Enter) is seen, or when the gap
//! since the last accepted character exceeds the inactivity timeout. The
//! timeout is checked on every arriving event and on `poll`, never by a
//! background timer owned by the decoder.

use crate::domain::types::{KeyInput, KeyState, RawEvent};
use std::time::Duration;
use tracing::{debug, trace};

/// Default inactivity timeout between characters
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

pub struct KeyDecoder {
    buffer: String,
    last_event_at: Option<Duration>,
    timeout: Duration,
    timeouts: u64,
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl KeyDecoder {
    pub fn new(timeout: Duration) -> Self {
        Self { buffer: String::with_capacity(64), last_event_at: None, timeout, timeouts: 0 }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of barcodes completed by the inactivity timeout
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume one event. Returns a completed barcode, if any.
    ///
    /// A stale buffer is decoded before the new event takes effect, so a
    /// single call never completes more than one barcode.
    pub fn feed(&mut self, event: RawEvent) -> Option<String> {
        if event.state != KeyState::Press {
            return None;
        }

        let stale = self.poll(event.at);

        match event.key {
            KeyInput::Char(c) => {
                self.buffer.push(c);
                self.last_event_at = Some(event.at);
                stale
            }
            KeyInput::Enter => stale.or_else(|| self.take_barcode()),
            KeyInput::Unmapped(code) => {
                trace!(code = code, "decoder_unmapped_key");
                stale
            }
        }
    }

    /// Decode the buffer if it has been idle longer than the timeout
    pub fn poll(&mut self, now: Duration) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let last = self.last_event_at?;
        if now.saturating_sub(last) <= self.timeout {
            return None;
        }
        debug!(
            idle_ms = %now.saturating_sub(last).as_millis(),
            len = self.buffer.len(),
            "decoder_timeout_flush"
        );
        self.timeouts += 1;
        self.take_barcode()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_event_at = None;
    }

    fn take_barcode(&mut self) -> Option<String> {
        let barcode = self.buffer.trim().to_string();
        self.clear();
        if barcode.is_empty() {
            return None;
        }
        debug!(barcode = %barcode, "barcode_decoded");
        Some(barcode)
    }
}

//! Key stream - decoder front end shared by every input source
//!
//! Stamps key events with a monotonic reception clock, runs them through the
//! decoder and counts timeout-completed barcodes.

use crate::domain::types::{KeyInput, KeyState, RawEvent};
use crate::infra::metrics::Metrics;
use crate::services::decoder::KeyDecoder;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lower bound for the flush tick so tiny timeouts don't spin
const MIN_TICK: Duration = Duration::from_millis(10);

pub struct KeyStream {
    decoder: KeyDecoder,
    started: Instant,
    seen_timeouts: u64,
    metrics: Arc<Metrics>,
}

impl KeyStream {
    pub fn new(timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self { decoder: KeyDecoder::new(timeout), started: Instant::now(), seen_timeouts: 0, metrics }
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Half the inactivity timeout; stale buffers flush within 1.5x timeout
    pub fn tick_interval(&self) -> Duration {
        (self.decoder.timeout() / 2).max(MIN_TICK)
    }

    pub fn key(&mut self, key: KeyInput, state: KeyState) -> Option<String> {
        let event = RawEvent { key, state, at: self.now() };
        let barcode = self.decoder.feed(event);
        self.count_timeouts();
        barcode
    }

    pub fn tick(&mut self) -> Option<String> {
        let barcode = self.decoder.poll(self.now());
        self.count_timeouts();
        barcode
    }

    /// Drop any partial barcode (device lost)
    pub fn reset(&mut self) {
        self.decoder.clear();
    }

    fn count_timeouts(&mut self) {
        let total = self.decoder.timeouts();
        for _ in self.seen_timeouts..total {
            self.metrics.record_decode_timeout();
        }
        self.seen_timeouts = total;
    }
}

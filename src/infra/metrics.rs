//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! All atomics use Relaxed ordering. They are statistical counters only and
//! must not drive coordination or control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Inventory call latency bucket boundaries (milliseconds)
/// Buckets: ≤5, ≤10, ≤25, ≤50, ≤100, ≤250, ≤500, ≤1000, ≤2500, ≤5000, >5000
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = [5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];
pub const METRICS_NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    METRICS_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn load_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Lock-free metrics collector
pub struct Metrics {
    started_at: Instant,
    scans_received: AtomicU64,
    scans_simulated: AtomicU64,
    scans_dropped: AtomicU64,
    decode_timeouts: AtomicU64,
    actions_succeeded: AtomicU64,
    actions_failed: AtomicU64,
    unknown_products: AtomicU64,
    products_created: AtomicU64,
    creation_failures: AtomicU64,
    inventory_errors: AtomicU64,
    processing_errors: AtomicU64,
    inventory_latency_sum_ms: AtomicU64,
    inventory_latency_max_ms: AtomicU64,
    inventory_latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            scans_received: AtomicU64::new(0),
            scans_simulated: AtomicU64::new(0),
            scans_dropped: AtomicU64::new(0),
            decode_timeouts: AtomicU64::new(0),
            actions_succeeded: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
            unknown_products: AtomicU64::new(0),
            products_created: AtomicU64::new(0),
            creation_failures: AtomicU64::new(0),
            inventory_errors: AtomicU64::new(0),
            processing_errors: AtomicU64::new(0),
            inventory_latency_sum_ms: AtomicU64::new(0),
            inventory_latency_max_ms: AtomicU64::new(0),
            inventory_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn record_scan(&self, simulated: bool) {
        self.scans_received.fetch_add(1, Ordering::Relaxed);
        if simulated {
            self.scans_simulated.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_scan_dropped(&self) {
        self.scans_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_timeout(&self) {
        self.decode_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_action(&self, success: bool) {
        if success {
            self.actions_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.actions_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_unknown_product(&self) {
        self.unknown_products.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_product_created(&self) {
        self.products_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_inventory_error(&self) {
        self.inventory_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_inventory_latency(&self, elapsed: Duration) {
        let latency_ms = elapsed.as_millis() as u64;
        self.inventory_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.inventory_latency_max_ms, latency_ms);
        self.inventory_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters (monotonic, nothing is reset)
    pub fn report(&self) -> MetricsSummary {
        let buckets = load_buckets(&self.inventory_latency_buckets);
        let calls: u64 = buckets.iter().sum();
        let sum = self.inventory_latency_sum_ms.load(Ordering::Relaxed);
        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            scans_received: self.scans_received.load(Ordering::Relaxed),
            scans_simulated: self.scans_simulated.load(Ordering::Relaxed),
            scans_dropped: self.scans_dropped.load(Ordering::Relaxed),
            decode_timeouts: self.decode_timeouts.load(Ordering::Relaxed),
            actions_succeeded: self.actions_succeeded.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
            unknown_products: self.unknown_products.load(Ordering::Relaxed),
            products_created: self.products_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            inventory_errors: self.inventory_errors.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
            inventory_calls: calls,
            inventory_latency_sum_ms: sum,
            inventory_latency_avg_ms: if calls > 0 { sum / calls } else { 0 },
            inventory_latency_max_ms: self.inventory_latency_max_ms.load(Ordering::Relaxed),
            inventory_latency_buckets: buckets,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub scans_received: u64,
    pub scans_simulated: u64,
    pub scans_dropped: u64,
    pub decode_timeouts: u64,
    pub actions_succeeded: u64,
    pub actions_failed: u64,
    pub unknown_products: u64,
    pub products_created: u64,
    pub creation_failures: u64,
    pub inventory_errors: u64,
    pub processing_errors: u64,
    pub inventory_calls: u64,
    pub inventory_latency_sum_ms: u64,
    pub inventory_latency_avg_ms: u64,
    pub inventory_latency_max_ms: u64,
    pub inventory_latency_buckets: [u64; METRICS_NUM_BUCKETS],
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            scans = %self.scans_received,
            simulated = %self.scans_simulated,
            dropped = %self.scans_dropped,
            decode_timeouts = %self.decode_timeouts,
            actions_ok = %self.actions_succeeded,
            actions_failed = %self.actions_failed,
            unknown = %self.unknown_products,
            created = %self.products_created,
            creation_failures = %self.creation_failures,
            inventory_errors = %self.inventory_errors,
            processing_errors = %self.processing_errors,
            inventory_avg_ms = %self.inventory_latency_avg_ms,
            inventory_max_ms = %self.inventory_latency_max_ms,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(5), 0);
        assert_eq!(bucket_index(6), 1);
        assert_eq!(bucket_index(5000), 9);
        assert_eq!(bucket_index(9999), 10);
    }

    #[test]
    fn test_report_counts() {
        let metrics = Metrics::new();
        metrics.record_scan(false);
        metrics.record_scan(true);
        metrics.record_action(true);
        metrics.record_action(false);
        metrics.record_inventory_latency(Duration::from_millis(20));
        metrics.record_inventory_latency(Duration::from_millis(40));

        let summary = metrics.report();
        assert_eq!(summary.scans_received, 2);
        assert_eq!(summary.scans_simulated, 1);
        assert_eq!(summary.actions_succeeded, 1);
        assert_eq!(summary.actions_failed, 1);
        assert_eq!(summary.inventory_calls, 2);
        assert_eq!(summary.inventory_latency_avg_ms, 30);
        assert_eq!(summary.inventory_latency_max_ms, 40);
        assert_eq!(summary.inventory_latency_buckets[2], 1);
        assert_eq!(summary.inventory_latency_buckets[3], 1);
    }
}

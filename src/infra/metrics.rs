//! Lock-free metrics collection and periodic reporting
//!
//! This is the observability sink for the tracking core: the publisher's
//! per-write completion callback, listener failures, subscription lifetimes
//! and service lifecycle transitions all land here.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for store write latency (milliseconds)
/// Buckets: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120
const BUCKET_BOUNDS: [u64; 10] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
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

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120, 10240];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Samples handed to the publisher (monotonic)
    samples_total: AtomicU64,
    /// Samples since last report (reset on report)
    samples_since_report: AtomicU64,
    /// Location writes confirmed by the store (monotonic)
    writes_ok_total: AtomicU64,
    /// Location writes the store rejected or failed (monotonic)
    writes_failed_total: AtomicU64,
    /// Write latency histogram buckets in ms (reset on report)
    write_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of write latencies in ms (reset on report)
    write_latency_sum_ms: AtomicU64,
    /// Max write latency in ms (reset on report)
    write_latency_max_ms: AtomicU64,
    /// Writes completed since last report (reset on report)
    writes_since_report: AtomicU64,
    /// Listener failures delivered to subscribers (monotonic)
    listener_errors_total: AtomicU64,
    /// Listener registrations that failed outright (monotonic)
    subscription_setup_failures: AtomicU64,
    /// Backend listeners attached (monotonic)
    subscriptions_opened: AtomicU64,
    /// Backend listeners detached (monotonic)
    subscriptions_closed: AtomicU64,
    /// Successful service starts (monotonic)
    service_starts: AtomicU64,
    /// Service stops that tore down a running session (monotonic)
    service_stops: AtomicU64,
    /// Start attempts rejected by acquisition preconditions (monotonic)
    start_failures: AtomicU64,
    /// Acquisition→publish pipelines that died abnormally (monotonic)
    pipeline_failures: AtomicU64,
    /// Time of the previous report
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            samples_total: AtomicU64::new(0),
            samples_since_report: AtomicU64::new(0),
            writes_ok_total: AtomicU64::new(0),
            writes_failed_total: AtomicU64::new(0),
            write_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            write_latency_sum_ms: AtomicU64::new(0),
            write_latency_max_ms: AtomicU64::new(0),
            writes_since_report: AtomicU64::new(0),
            listener_errors_total: AtomicU64::new(0),
            subscription_setup_failures: AtomicU64::new(0),
            subscriptions_opened: AtomicU64::new(0),
            subscriptions_closed: AtomicU64::new(0),
            service_starts: AtomicU64::new(0),
            service_stops: AtomicU64::new(0),
            start_failures: AtomicU64::new(0),
            pipeline_failures: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a sample entering the publish loop (lock-free)
    #[inline]
    pub fn record_sample(&self) {
        self.samples_total.fetch_add(1, Ordering::Relaxed);
        self.samples_since_report.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one location write (lock-free)
    #[inline]
    pub fn record_write(&self, success: bool, latency_ms: u64) {
        if success {
            self.writes_ok_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.writes_failed_total.fetch_add(1, Ordering::Relaxed);
        }
        self.writes_since_report.fetch_add(1, Ordering::Relaxed);
        self.write_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let bucket = bucket_index(latency_ms);
        self.write_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.write_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_listener_error(&self) {
        self.listener_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_subscription_setup_failure(&self) {
        self.subscription_setup_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_subscription_opened(&self) {
        self.subscriptions_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_subscription_closed(&self) {
        self.subscriptions_closed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_service_start(&self) {
        self.service_starts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_service_stop(&self) {
        self.service_stops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pipeline_failure(&self) {
        self.pipeline_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_total(&self) -> u64 {
        self.samples_total.load(Ordering::Relaxed)
    }

    pub fn writes_ok_total(&self) -> u64 {
        self.writes_ok_total.load(Ordering::Relaxed)
    }

    pub fn writes_failed_total(&self) -> u64 {
        self.writes_failed_total.load(Ordering::Relaxed)
    }

    pub fn listener_errors_total(&self) -> u64 {
        self.listener_errors_total.load(Ordering::Relaxed)
    }

    pub fn pipeline_failures(&self) -> u64 {
        self.pipeline_failures.load(Ordering::Relaxed)
    }

    /// Listeners currently attached
    pub fn active_subscriptions(&self) -> u64 {
        let opened = self.subscriptions_opened.load(Ordering::Relaxed);
        let closed = self.subscriptions_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        let samples_count = self.samples_since_report.swap(0, Ordering::Relaxed);
        let writes_count = self.writes_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.write_latency_sum_ms.swap(0, Ordering::Relaxed);
        let max_latency = self.write_latency_max_ms.swap(0, Ordering::Relaxed);
        let write_lat_buckets = swap_buckets(&self.write_latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let samples_per_sec = if elapsed.as_secs_f64() > 0.0 {
            samples_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let write_lat_avg_ms = if writes_count > 0 { latency_sum / writes_count } else { 0 };

        MetricsSummary {
            samples_total: self.samples_total.load(Ordering::Relaxed),
            samples_per_sec,
            writes_ok_total: self.writes_ok_total.load(Ordering::Relaxed),
            writes_failed_total: self.writes_failed_total.load(Ordering::Relaxed),
            write_lat_buckets,
            write_lat_avg_ms,
            write_lat_max_ms: max_latency,
            write_lat_p99_ms: percentile_from_buckets(&write_lat_buckets, 0.99),
            listener_errors_total: self.listener_errors_total.load(Ordering::Relaxed),
            subscription_setup_failures: self.subscription_setup_failures.load(Ordering::Relaxed),
            active_subscriptions: self.active_subscriptions(),
            service_starts: self.service_starts.load(Ordering::Relaxed),
            service_stops: self.service_stops.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            pipeline_failures: self.pipeline_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub samples_total: u64,
    pub samples_per_sec: f64,
    pub writes_ok_total: u64,
    pub writes_failed_total: u64,
    /// Write latency histogram buckets
    /// Bounds: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120 ms
    pub write_lat_buckets: [u64; NUM_BUCKETS],
    pub write_lat_avg_ms: u64,
    pub write_lat_max_ms: u64,
    pub write_lat_p99_ms: u64,
    pub listener_errors_total: u64,
    pub subscription_setup_failures: u64,
    pub active_subscriptions: u64,
    pub service_starts: u64,
    pub service_stops: u64,
    pub start_failures: u64,
    pub pipeline_failures: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            samples_total = %self.samples_total,
            samples_per_sec = format!("{:.2}", self.samples_per_sec),
            writes_ok = %self.writes_ok_total,
            writes_failed = %self.writes_failed_total,
            write_avg_ms = %self.write_lat_avg_ms,
            write_max_ms = %self.write_lat_max_ms,
            write_p99_ms = %self.write_lat_p99_ms,
            listener_errors = %self.listener_errors_total,
            subscription_setup_failures = %self.subscription_setup_failures,
            active_subscriptions = %self.active_subscriptions,
            service_starts = %self.service_starts,
            service_stops = %self.service_stops,
            start_failures = %self.start_failures,
            pipeline_failures = %self.pipeline_failures,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.samples_total(), 0);
        assert_eq!(metrics.active_subscriptions(), 0);
    }

    #[test]
    fn test_record_writes() {
        let metrics = Metrics::new();

        metrics.record_write(true, 15);
        metrics.record_write(false, 45);
        metrics.record_write(true, 30);

        assert_eq!(metrics.writes_ok_total(), 2);
        assert_eq!(metrics.writes_failed_total(), 1);
        assert_eq!(metrics.write_latency_sum_ms.load(Ordering::Relaxed), 90);
        assert_eq!(metrics.write_latency_max_ms.load(Ordering::Relaxed), 45);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();

        metrics.record_sample();
        metrics.record_sample();
        metrics.record_write(true, 10);
        metrics.record_write(true, 30);
        metrics.record_listener_error();

        let summary = metrics.report();

        assert_eq!(summary.samples_total, 2);
        assert_eq!(summary.writes_ok_total, 2);
        assert_eq!(summary.write_lat_avg_ms, 20);
        assert_eq!(summary.write_lat_max_ms, 30);
        assert_eq!(summary.listener_errors_total, 1);

        // Periodic counters should be reset, monotonic ones kept
        assert_eq!(metrics.samples_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.write_latency_sum_ms.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.samples_total(), 2);
    }

    #[test]
    fn test_report_lifecycle_counters() {
        let metrics = Metrics::new();
        metrics.record_service_start();
        metrics.record_service_stop();
        metrics.record_start_failure();
        metrics.record_subscription_setup_failure();

        let summary = metrics.report();
        assert_eq!(summary.service_starts, 1);
        assert_eq!(summary.service_stops, 1);
        assert_eq!(summary.start_failures, 1);
        assert_eq!(summary.subscription_setup_failures, 1);
        summary.log();
    }

    #[test]
    fn test_report_empty() {
        let summary = Metrics::new().report();
        assert_eq!(summary.samples_total, 0);
        assert_eq!(summary.write_lat_avg_ms, 0);
        assert_eq!(summary.write_lat_p99_ms, 0);
    }

    #[test]
    fn test_active_subscriptions() {
        let metrics = Metrics::new();
        metrics.record_subscription_opened();
        metrics.record_subscription_opened();
        metrics.record_subscription_closed();
        assert_eq!(metrics.active_subscriptions(), 1);

        // A stray close never underflows the gauge
        metrics.record_subscription_closed();
        metrics.record_subscription_closed();
        assert_eq!(metrics.active_subscriptions(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    m.record_sample();
                    m.record_write(i % 2 == 0, i as u64);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.samples_total(), 10_000);
        assert_eq!(metrics.writes_ok_total() + metrics.writes_failed_total(), 10_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(10), 0);
        assert_eq!(bucket_index(11), 1);
        assert_eq!(bucket_index(5120), 9);
        assert_eq!(bucket_index(5121), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_write(true, 15);
        }
        let summary = metrics.report();
        assert_eq!(summary.write_lat_p99_ms, 20);
        assert_eq!(summary.write_lat_buckets[1], 100);
    }
}

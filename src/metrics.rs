// Performance metrics module
//
// Provides lightweight metrics tracking for monitoring classification throughput

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Metrics are collected throughout the session and logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Analysis cycles started (one per accepted submit)
    pub requests_started: AtomicU64,

    /// Cycles that ended in `Success`
    pub requests_classified: AtomicU64,

    /// Cycles that ended in `Error`
    pub requests_failed: AtomicU64,

    /// Cycles abandoned because a newer submit or a clear took over
    pub requests_superseded: AtomicU64,

    /// Total time spent waiting on the oracle in milliseconds
    pub total_oracle_time_ms: AtomicU64,

    /// Number of oracle round trips that returned (successfully or not)
    pub oracle_calls: AtomicU64,

    /// Number of state broadcasts sent
    pub state_broadcasts: AtomicU64,

    /// Number of state broadcast errors (no subscribers)
    pub state_broadcast_errors: AtomicU64,

    start_time: Instant,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_started: u64,
    pub requests_classified: u64,
    pub requests_failed: u64,
    pub requests_superseded: u64,
    pub total_oracle_time_ms: u64,
    pub oracle_calls: u64,
    pub state_broadcasts: u64,
    pub state_broadcast_errors: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_started: AtomicU64::new(0),
            requests_classified: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_superseded: AtomicU64::new(0),
            total_oracle_time_ms: AtomicU64::new(0),
            oracle_calls: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcast_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classified(&self) {
        self.requests_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_superseded(&self) {
        self.requests_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one oracle round trip
    pub fn record_oracle_time(&self, duration: Duration) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
        self.total_oracle_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast_error(&self) {
        self.state_broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average oracle latency in milliseconds
    pub fn avg_oracle_time_ms(&self) -> f64 {
        let total = self.total_oracle_time_ms.load(Ordering::Relaxed);
        let count = self.oracle_calls.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_classified: self.requests_classified.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_superseded: self.requests_superseded.load(Ordering::Relaxed),
            total_oracle_time_ms: self.total_oracle_time_ms.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            state_broadcasts: self.state_broadcasts.load(Ordering::Relaxed),
            state_broadcast_errors: self.state_broadcast_errors.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Requests: {} started, {} classified, {} failed, {} superseded",
            s.requests_started,
            s.requests_classified,
            s.requests_failed,
            s.requests_superseded
        );
        tracing::info!(
            "Oracle: {} calls, {:.2}s total (avg: {:.2}ms per call)",
            s.oracle_calls,
            s.total_oracle_time_ms as f64 / 1000.0,
            self.avg_oracle_time_ms()
        );
        tracing::info!(
            "State broadcasts: {}, errors: {}",
            s.state_broadcasts,
            s.state_broadcast_errors
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

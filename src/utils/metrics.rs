//! Observability and Metrics
//!
//! Counters for exchanges, frames and failures, shared by every device in the
//! process.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for exchange operations
#[derive(Debug)]
pub struct Metrics {
    /// Total exchanges started
    pub exchanges_total: AtomicU64,
    /// Exchanges that returned a payload
    pub exchanges_success: AtomicU64,
    /// Exchanges that returned an error
    pub exchanges_failed: AtomicU64,
    /// Packets written to transports
    pub frames_written: AtomicU64,
    /// Packets read from transports
    pub frames_read: AtomicU64,
    /// Command bytes sent (before framing)
    pub bytes_sent: AtomicU64,
    /// Response bytes received (after reassembly)
    pub bytes_received: AtomicU64,
    /// Channel, tag, sequence and length violations
    pub protocol_errors: AtomicU64,
    /// Write/read failures
    pub transport_errors: AtomicU64,
    /// Non-success status words
    pub status_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            exchanges_total: AtomicU64::new(0),
            exchanges_success: AtomicU64::new(0),
            exchanges_failed: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            frames_read: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            status_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the start of an exchange
    pub fn exchange_started(&self, command_len: u64) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(command_len, Ordering::Relaxed);
    }

    /// Record a successful exchange
    pub fn exchange_succeeded(&self, response_len: u64) {
        self.exchanges_success.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(response_len, Ordering::Relaxed);
    }

    /// Record a failed exchange
    pub fn exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_written(&self, count: u64) {
        self.frames_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_frames_read(&self, count: u64) {
        self.frames_read.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a framing violation
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transport failure
    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a non-success status word
    pub fn status_error(&self) {
        self.status_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_success: self.exchanges_success.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_read: self.frames_read.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            status_errors: self.status_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            exchanges_total = snapshot.exchanges_total,
            exchanges_success = snapshot.exchanges_success,
            exchanges_failed = snapshot.exchanges_failed,
            frames_written = snapshot.frames_written,
            frames_read = snapshot.frames_read,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            protocol_errors = snapshot.protocol_errors,
            transport_errors = snapshot.transport_errors,
            status_errors = snapshot.status_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Exchange metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchanges_success: u64,
    pub exchanges_failed: u64,
    pub frames_written: u64,
    pub frames_read: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub protocol_errors: u64,
    pub transport_errors: u64,
    pub status_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.exchange_started(10);
        metrics.record_frames_written(2);
        metrics.record_frames_read(1);
        metrics.exchange_succeeded(4);
        metrics.exchange_started(5);
        metrics.status_error();
        metrics.exchange_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.exchanges_total, 2);
        assert_eq!(snapshot.exchanges_success, 1);
        assert_eq!(snapshot.exchanges_failed, 1);
        assert_eq!(snapshot.bytes_sent, 15);
        assert_eq!(snapshot.bytes_received, 4);
        assert_eq!(snapshot.frames_written, 2);
        assert_eq!(snapshot.frames_read, 1);
        assert_eq!(snapshot.status_errors, 1);
        assert_eq!(snapshot.protocol_errors, 0);
    }
}

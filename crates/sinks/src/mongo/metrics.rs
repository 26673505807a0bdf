//! MongoDB sink metrics
//!
//! Atomic counters for tracking sink throughput and recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::report::WriteReport;

// =============================================================================
// Metrics
// =============================================================================

/// Metrics for the MongoDB sink
#[derive(Debug, Default)]
pub struct MongoMetrics {
    /// Chunks received from the channel
    pub batches_received: AtomicU64,

    /// Records received
    pub records_received: AtomicU64,

    /// Documents stored unmodified
    pub documents_written: AtomicU64,

    /// Documents stored after stripping fields
    pub documents_recovered: AtomicU64,

    /// Documents permanently rejected
    pub permanent_failures: AtomicU64,

    /// Completed flushes
    pub flushes: AtomicU64,

    /// Store round trips beyond the first, per flush
    pub retry_rounds: AtomicU64,

    /// Fatal flush errors (each failed attempt)
    pub fatal_errors: AtomicU64,

    /// Documents dropped after retries ran out
    pub dropped_documents: AtomicU64,
}

impl MongoMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            records_received: AtomicU64::new(0),
            documents_written: AtomicU64::new(0),
            documents_recovered: AtomicU64::new(0),
            permanent_failures: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            retry_rounds: AtomicU64::new(0),
            fatal_errors: AtomicU64::new(0),
            dropped_documents: AtomicU64::new(0),
        }
    }

    /// Record a chunk of `records` received
    #[inline]
    pub fn record_batch_received(&self, records: u64) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.records_received.fetch_add(records, Ordering::Relaxed);
    }

    /// Record the outcome of a completed flush
    pub fn record_report(&self, report: &WriteReport) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.documents_written
            .fetch_add(report.written as u64, Ordering::Relaxed);
        self.documents_recovered
            .fetch_add(report.recovered.len() as u64, Ordering::Relaxed);
        self.permanent_failures
            .fetch_add(report.permanent.len() as u64, Ordering::Relaxed);
        self.retry_rounds
            .fetch_add(report.rounds.saturating_sub(1) as u64, Ordering::Relaxed);
    }

    /// Record a fatal flush error
    #[inline]
    pub fn record_fatal_error(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record documents given up on
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.dropped_documents.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            documents_recovered: self.documents_recovered.load(Ordering::Relaxed),
            permanent_failures: self.permanent_failures.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            retry_rounds: self.retry_rounds.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            dropped_documents: self.dropped_documents.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub records_received: u64,
    pub documents_written: u64,
    pub documents_recovered: u64,
    pub permanent_failures: u64,
    pub flushes: u64,
    pub retry_rounds: u64,
    pub fatal_errors: u64,
    pub dropped_documents: u64,
}

impl MetricsSnapshot {
    /// Documents that reached the store
    pub fn documents_stored(&self) -> u64 {
        self.documents_written + self.documents_recovered
    }
}

// =============================================================================
// Metrics Handle
// =============================================================================

/// Handle for reading sink metrics
///
/// Holds an Arc to the counters, so it stays valid after the sink is
/// consumed by `run()`.
#[derive(Debug, Clone)]
pub struct MongoSinkMetricsHandle {
    id: String,
    metrics: Arc<MongoMetrics>,
}

impl MongoSinkMetricsHandle {
    /// Create a new metrics handle
    pub fn new(id: String, metrics: Arc<MongoMetrics>) -> Self {
        Self { id, metrics }
    }

    /// Sink identifier
    pub fn sink_id(&self) -> &str {
        &self.id
    }

    /// Sink type
    pub fn sink_type(&self) -> &str {
        "mongo"
    }

    /// Current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mongo::report::RecoveredDocument;

    #[test]
    fn test_record_report() {
        let metrics = MongoMetrics::new();
        let mut report = WriteReport::new(4);
        report.written = 3;
        report.recovered.push(RecoveredDocument {
            ordinal: 2,
            stripped_fields: vec!["a".into()],
        });
        report.rounds = 2;

        metrics.record_report(&report);

        let s = metrics.snapshot();
        assert_eq!(s.flushes, 1);
        assert_eq!(s.documents_written, 3);
        assert_eq!(s.documents_recovered, 1);
        assert_eq!(s.documents_stored(), 4);
        assert_eq!(s.permanent_failures, 0);
        assert_eq!(s.retry_rounds, 1);
    }

    #[test]
    fn test_handle_shares_counters() {
        let metrics = Arc::new(MongoMetrics::new());
        let handle = MongoSinkMetricsHandle::new("mongo".into(), Arc::clone(&metrics));

        metrics.record_batch_received(10);
        metrics.record_fatal_error();
        metrics.record_dropped(10);

        let s = handle.snapshot();
        assert_eq!(handle.sink_id(), "mongo");
        assert_eq!(s.batches_received, 1);
        assert_eq!(s.records_received, 10);
        assert_eq!(s.fatal_errors, 1);
        assert_eq!(s.dropped_documents, 10);
    }
}

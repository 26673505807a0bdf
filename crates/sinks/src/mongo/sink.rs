//! MongoDB sink implementation
//!
//! Receives record chunks, normalizes them into documents and flushes
//! batches through the [`BulkWriter`].

use std::sync::Arc;

use mongodb::bson::Document;
use tokio::sync::mpsc;

use crate::util::RateLimitedLogger;

use super::classify::{ErrorClassifier, MongoErrorClassifier};
use super::client::MongoStore;
use super::config::MongoConfig;
use super::coordinator::BulkWriter;
use super::error::MongoSinkError;
use super::metrics::{MetricsSnapshot, MongoMetrics, MongoSinkMetricsHandle};
use super::normalize::{LogRecord, Normalizer};
use super::report::WriteReport;
use super::store::DocumentStore;

/// MongoDB sink
///
/// Flushes when `batch_size` documents are pending, on every
/// `flush_interval` tick, and once more when the channel closes. No batch
/// handed to the store holds more than `batch_size` documents.
pub struct MongoSink {
    /// Channel receiver for record chunks
    receiver: mpsc::Receiver<Vec<LogRecord>>,

    /// Configuration
    config: MongoConfig,

    /// Store the writer talks to
    store: Arc<dyn DocumentStore>,

    /// Record to document conversion
    normalizer: Normalizer,

    /// Bulk write coordinator
    writer: BulkWriter,

    /// Documents awaiting the next flush
    pending: Vec<Document>,

    /// Metrics (Arc for sharing with metrics handle)
    metrics: Arc<MongoMetrics>,

    /// Warnings for permanently rejected documents
    rejections: RateLimitedLogger,

    /// Sink name for identification
    name: String,
}

impl MongoSink {
    /// Connect to MongoDB and prepare the target collection
    pub async fn connect(
        config: MongoConfig,
        receiver: mpsc::Receiver<Vec<LogRecord>>,
    ) -> Result<Self, MongoSinkError> {
        let store = MongoStore::connect(&config).await?;
        store.ensure_collection(config.capped).await?;
        Ok(Self::new(config, Arc::new(store), receiver))
    }

    /// Create a sink over any document store
    pub fn new(
        config: MongoConfig,
        store: Arc<dyn DocumentStore>,
        receiver: mpsc::Receiver<Vec<LogRecord>>,
    ) -> Self {
        Self::with_name(config, store, receiver, "mongo")
    }

    /// Create a sink with a custom name
    pub fn with_name(
        config: MongoConfig,
        store: Arc<dyn DocumentStore>,
        receiver: mpsc::Receiver<Vec<LogRecord>>,
        name: impl Into<String>,
    ) -> Self {
        let writer = build_writer(&config, Arc::clone(&store), Arc::new(MongoErrorClassifier));
        let capacity = config.batch_size;

        Self {
            receiver,
            normalizer: config.normalizer(),
            writer,
            store,
            pending: Vec::with_capacity(capacity),
            config,
            metrics: Arc::new(MongoMetrics::new()),
            rejections: RateLimitedLogger::default(),
            name: name.into(),
        }
    }

    /// Replace the error classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.writer = build_writer(&self.config, Arc::clone(&self.store), classifier);
        self
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &MongoMetrics {
        &self.metrics
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> MongoSinkMetricsHandle {
        MongoSinkMetricsHandle::new(self.name.clone(), Arc::clone(&self.metrics))
    }

    /// Get the sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get reference to config
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Run the sink until the channel closes
    pub async fn run(mut self) -> Result<MetricsSnapshot, MongoSinkError> {
        tracing::info!(
            sink = %self.name,
            store = self.store.name(),
            batch_size = self.config.batch_size,
            ordered = self.config.ordered,
            broken_fields = ?self.config.broken_fields,
            "mongo sink starting"
        );

        // First tick one period out; an immediate tick would flush a partial first chunk.
        let period = self.config.flush_interval;
        let mut flush_interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                chunk = self.receiver.recv() => {
                    match chunk {
                        Some(chunk) => {
                            self.process_chunk(chunk);
                            while self.pending.len() >= self.config.batch_size.max(1) {
                                self.flush().await;
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_interval.tick() => {
                    self.flush_all().await;
                }
            }
        }

        // Final flush
        self.flush_all().await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            batches_received = snapshot.batches_received,
            records = snapshot.records_received,
            written = snapshot.documents_written,
            recovered = snapshot.documents_recovered,
            permanent_failures = snapshot.permanent_failures,
            dropped = snapshot.dropped_documents,
            "mongo sink shutting down"
        );

        Ok(snapshot)
    }

    /// Normalize a chunk into the pending batch
    pub(crate) fn process_chunk(&mut self, chunk: Vec<LogRecord>) {
        self.metrics.record_batch_received(chunk.len() as u64);
        self.pending.extend(
            chunk
                .iter()
                .map(|record| self.normalizer.normalize_log(record)),
        );
    }

    /// Flush until nothing is pending
    async fn flush_all(&mut self) {
        while !self.pending.is_empty() {
            self.flush().await;
        }
    }

    /// Write out the oldest `batch_size` pending documents
    ///
    /// Never fails: a batch that cannot be written after all retries is
    /// dropped and counted.
    pub(crate) async fn flush(&mut self) -> Option<WriteReport> {
        let take = self.pending.len().min(self.config.batch_size.max(1));
        let batch: Vec<Document> = self.pending.drain(..take).collect();

        match self.write_with_retry(&batch).await {
            Ok(report) => {
                self.metrics.record_report(&report);
                self.log_report(&report);
                Some(report)
            }
            Err(e) => {
                self.metrics.record_dropped(batch.len() as u64);
                tracing::error!(
                    sink = %self.name,
                    error = %e,
                    count = batch.len(),
                    "dropping batch after failed flush"
                );
                None
            }
        }
    }

    /// Write a batch, retrying fatal failures with backoff
    async fn write_with_retry(&self, batch: &[Document]) -> Result<WriteReport, MongoSinkError> {
        let mut delay = self.config.retry_base_delay;
        let mut attempt = 0;

        loop {
            match self.writer.write(batch).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    self.metrics.record_fatal_error();
                    if !e.is_retryable() || attempt >= self.config.retry_attempts {
                        return Err(e);
                    }

                    attempt += 1;
                    tracing::warn!(
                        sink = %self.name,
                        error = %e,
                        attempt,
                        max_attempts = self.config.retry_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "flush failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.retry_max_delay);
                }
            }
        }
    }

    fn log_report(&self, report: &WriteReport) {
        tracing::debug!(
            sink = %self.name,
            submitted = report.submitted,
            written = report.written,
            recovered = report.recovered.len(),
            permanent = report.permanent.len(),
            rounds = report.rounds,
            "flushed batch"
        );

        for recovered in &report.recovered {
            tracing::info!(
                sink = %self.name,
                ordinal = recovered.ordinal,
                stripped = ?recovered.stripped_fields,
                "stored document after stripping broken fields"
            );
        }

        for failure in &report.permanent {
            self.rejections.warn(
                &format!("document {} rejected ({})", failure.ordinal, failure.reason),
                &failure.error,
                &failure.document.to_string(),
            );
        }
    }
}

fn build_writer(
    config: &MongoConfig,
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn ErrorClassifier>,
) -> BulkWriter {
    BulkWriter::new(store, classifier, config.isolator(), config.write_options())
        .with_write_timeout(config.write_timeout)
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;

//! Bulk write coordination
//!
//! [`BulkWriter::write`] submits a batch, then resolves per-document
//! rejections round by round:
//!
//! ```text
//! batch ──insert_many──> store
//!            │ rejected docs
//!            ▼
//!   classify → isolate ──reduced──> next round
//!            └──not reducible──> permanent failure
//! ```
//!
//! Documents the store accepted are never resubmitted. A reduced document
//! loses at least one field per round, so the number of rounds is bounded
//! by the size of the broken-field set (plus carry-over rounds in ordered
//! mode, each of which resolves at least one document).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::Document;

use super::classify::ErrorClassifier;
use super::error::MongoSinkError;
use super::isolate::{FailureIsolator, Reduction};
use super::report::{FailureReason, PermanentFailure, RecoveredDocument, WriteReport};
use super::store::{DocumentStore, StoreError, WriteFailure, WriteOptions};

/// Per-document bookkeeping across rounds
struct Slot {
    /// 1-based position in the submitted batch
    ordinal: usize,
    /// Fields stripped so far
    stripped: Vec<String>,
}

/// Writes batches and recovers from partial bulk failures
pub struct BulkWriter {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn ErrorClassifier>,
    isolator: FailureIsolator,
    options: WriteOptions,
    write_timeout: Option<Duration>,
}

impl BulkWriter {
    /// Create a writer
    pub fn new(
        store: Arc<dyn DocumentStore>,
        classifier: Arc<dyn ErrorClassifier>,
        isolator: FailureIsolator,
        options: WriteOptions,
    ) -> Self {
        Self {
            store,
            classifier,
            isolator,
            options,
            write_timeout: None,
        }
    }

    /// Bound each store round trip
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Write options passed to the store
    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Write a batch, recovering what can be recovered
    ///
    /// Returns `Err` only for fatal conditions (transport failure, timeout,
    /// nonsensical store response). Per-document failures are reported in
    /// the returned [`WriteReport`].
    pub async fn write(&self, batch: &[Document]) -> Result<WriteReport, MongoSinkError> {
        let mut report = WriteReport::new(batch.len());
        if batch.is_empty() {
            return Ok(report);
        }

        // Round one submits the caller's slice as-is; later rounds own their documents.
        let mut owned: Option<Vec<Document>> = None;
        let mut slots: Vec<Slot> = (1..=batch.len())
            .map(|ordinal| Slot {
                ordinal,
                stripped: Vec::new(),
            })
            .collect();

        loop {
            let docs: &[Document] = owned.as_deref().unwrap_or(batch);
            if docs.is_empty() {
                break;
            }

            report.rounds += 1;
            let mut failed = self.submit(docs).await?;

            // Ordered writes stop at the first rejection; anything after it was never attempted.
            let halted_after = if self.options.ordered {
                failed.keys().next_back().copied()
            } else {
                None
            };

            let mut next_docs = Vec::new();
            let mut next_slots = Vec::new();

            for (index, (doc, mut slot)) in docs.iter().zip(slots).enumerate() {
                if let Some(failure) = failed.remove(&index) {
                    let offending = self.classifier.implicated_fields(&failure, doc);
                    match self.isolator.reduce(doc, &offending, slot.ordinal) {
                        Reduction::Reduced { document, stripped } => {
                            tracing::debug!(
                                store = self.store.name(),
                                ordinal = slot.ordinal,
                                code = failure.code,
                                fields = ?stripped,
                                "stripping broken fields and retrying document"
                            );
                            slot.stripped.extend(stripped);
                            next_docs.push(document);
                            next_slots.push(slot);
                        }
                        Reduction::NotReducible(reason) => {
                            let reason = match reason {
                                FailureReason::Unattributed if !slot.stripped.is_empty() => {
                                    FailureReason::CandidatesExhausted
                                }
                                other => other,
                            };
                            tracing::debug!(
                                store = self.store.name(),
                                ordinal = slot.ordinal,
                                code = failure.code,
                                reason = %reason,
                                "document permanently rejected"
                            );
                            report.permanent.push(PermanentFailure {
                                ordinal: slot.ordinal,
                                document: batch[slot.ordinal - 1].clone(),
                                error: (&failure).into(),
                                reason,
                            });
                        }
                    }
                } else if halted_after.is_some_and(|last| index > last) {
                    next_docs.push(doc.clone());
                    next_slots.push(slot);
                } else if slot.stripped.is_empty() {
                    report.written += 1;
                } else {
                    report.recovered.push(RecoveredDocument {
                        ordinal: slot.ordinal,
                        stripped_fields: slot.stripped,
                    });
                }
            }

            owned = Some(next_docs);
            slots = next_slots;
        }

        report.recovered.sort_by_key(|r| r.ordinal);
        report.permanent.sort_by_key(|p| p.ordinal);
        Ok(report)
    }

    /// One store round trip
    ///
    /// Returns the rejected documents keyed by index (empty on full success).
    async fn submit(&self, docs: &[Document]) -> Result<BTreeMap<usize, WriteFailure>, MongoSinkError> {
        let insert = self.store.insert_many(docs, &self.options);
        let result = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, insert)
                .await
                .map_err(|_| MongoSinkError::Timeout(limit))?,
            None => insert.await,
        };

        let failures = match result {
            Ok(()) => return Ok(BTreeMap::new()),
            Err(StoreError::BulkWrite(failures)) => failures,
            Err(StoreError::Transport(msg)) => return Err(MongoSinkError::Store(msg)),
        };

        let mut by_index = BTreeMap::new();
        for failure in failures {
            if failure.index >= docs.len() {
                return Err(MongoSinkError::InvalidFailureIndex {
                    index: failure.index,
                    len: docs.len(),
                });
            }
            by_index.entry(failure.index).or_insert(failure);
        }
        Ok(by_index)
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_test;

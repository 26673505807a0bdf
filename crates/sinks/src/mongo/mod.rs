//! MongoDB Sink - Document Store with Partial-Failure Recovery
//!
//! Writes log records as BSON documents and keeps going when the server
//! rejects part of a bulk insert.
//!
//! # Features
//!
//! - **Key sanitization**: `.` and leading `$` in keys rewritten, recursively
//! - **Time/tag injection**: Optional synthetic fields per document
//! - **Bulk recovery**: Rejected documents lose their configured broken
//!   fields, get annotated with their batch position and are retried
//! - **Conservative policy**: A document is never altered beyond the
//!   configured fields; anything else is reported as permanently rejected
//! - **Retry logic**: Exponential backoff on fatal flush failures
//!
//! # Flow
//!
//! ```text
//! LogRecord ──normalize──> Document ──batch──> BulkWriter ──> DocumentStore
//!                                                │
//!                                   classify ← rejections → isolate
//! ```

mod classify;
mod client;
mod config;
mod coordinator;
mod error;
mod isolate;
mod metrics;
mod normalize;
mod report;
mod sanitize;
mod sink;
mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API
pub use classify::{
    CODE_BAD_VALUE, CODE_DOCUMENT_VALIDATION, CODE_DOLLAR_PREFIXED_FIELD, CODE_DOTTED_FIELD,
    CODE_TYPE_MISMATCH, ErrorClassifier, MongoErrorClassifier,
};
pub use client::MongoStore;
pub use config::{
    CappedCollection, DEFAULT_ANNOTATION_KEY, DEFAULT_BATCH_SIZE, DEFAULT_CONNECTION_STRING,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_RETRY_ATTEMPTS, DEFAULT_TAG_KEY, DEFAULT_TIME_KEY,
    MongoConfig,
};
pub use coordinator::BulkWriter;
pub use error::MongoSinkError;
pub use isolate::{FailureIsolator, Reduction};
pub use metrics::{MetricsSnapshot, MongoMetrics, MongoSinkMetricsHandle};
pub use normalize::{LogRecord, NormalizeOptions, Normalizer, Record, json_to_bson};
pub use report::{DocumentError, FailureReason, PermanentFailure, RecoveredDocument, WriteReport};
pub use sanitize::KeySanitizer;
pub use sink::MongoSink;
pub use store::{DocumentStore, StoreError, WriteFailure, WriteOptions};

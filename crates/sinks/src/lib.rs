//! Docsink - Sinks
//!
//! Log-record sink for MongoDB that survives partial bulk-insert failures.
//!
//! # Architecture
//!
//! The sink receives `Vec<LogRecord>` chunks via a tokio channel, turns each
//! record into a document and flushes batches to the store. When the store
//! rejects some documents of a batch, only those are repaired and retried.
//!
//! ```text
//! [Reader] --Vec<LogRecord>--> [Sink Channel] --> [MongoSink] --> [MongoDB]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docsink_sinks::mongo::{MongoConfig, MongoSink};
//! use tokio::sync::mpsc;
//!
//! let config = MongoConfig::new("logs", "access").with_broken_fields(["payload"]);
//! let (tx, rx) = mpsc::channel(64);
//! let sink = MongoSink::connect(config, rx).await?;
//!
//! let task = tokio::spawn(sink.run());
//! tx.send(records).await?;
//! drop(tx);
//! let snapshot = task.await??;
//! ```

/// MongoDB sink - bulk writes with per-document recovery
pub mod mongo;

/// Shared sink utilities
pub mod util;

pub use mongo::{
    DocumentStore, LogRecord, MongoConfig, MongoSink, MongoSinkError, MongoSinkMetricsHandle,
    MongoStore, WriteReport,
};

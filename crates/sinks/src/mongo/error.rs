//! MongoDB sink errors

use std::time::Duration;

/// Errors from the MongoDB sink
///
/// Every variant is fatal for the flush that produced it. Per-document
/// rejections are never errors; they end up in a `WriteReport`.
#[derive(Debug, thiserror::Error)]
pub enum MongoSinkError {
    /// Driver error outside a bulk write (connect, collection setup)
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Store unreachable or otherwise failed as a whole
    #[error("store error: {0}")]
    Store(String),

    /// A store round trip exceeded the write timeout
    #[error("bulk write timed out after {0:?}")]
    Timeout(Duration),

    /// The store blamed a document that was not in the batch
    #[error("store reported failure for index {index} in a batch of {len}")]
    InvalidFailureIndex { index: usize, len: usize },
}

impl MongoSinkError {
    /// Whether re-flushing the same batch may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Mongo(_) | Self::Store(_) | Self::Timeout(_))
    }
}

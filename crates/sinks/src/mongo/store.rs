//! Document store boundary
//!
//! The engine talks to the database through [`DocumentStore`]. The store
//! reports either full success, a per-document rejection list, or a
//! transport failure. Nothing else about the driver leaks past this trait.

use async_trait::async_trait;
use mongodb::bson::Document;

/// Acknowledgement and ordering semantics for a bulk insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Stop at the first rejected document
    pub ordered: bool,
    /// Wait for the journal before acknowledging
    pub journaled: bool,
    /// Number of nodes that must acknowledge (`w`)
    pub write_concern: Option<u32>,
}

/// A single document rejected by a bulk insert
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    /// Position of the document in the submitted slice
    pub index: usize,
    /// Server error code
    pub code: i32,
    /// Symbolic error code name, when the server sends one
    pub code_name: Option<String>,
    /// Server error message
    pub message: String,
    /// Structured error details (schema validation output)
    pub details: Option<Document>,
}

impl WriteFailure {
    /// Create a failure without details
    pub fn new(index: usize, code: i32, message: impl Into<String>) -> Self {
        Self {
            index,
            code,
            code_name: None,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: Document) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a code name
    pub fn with_code_name(mut self, code_name: impl Into<String>) -> Self {
        self.code_name = Some(code_name.into());
        self
    }
}

/// Errors returned by a [`DocumentStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Some documents were rejected; the rest were written
    #[error("bulk write rejected {} document(s)", .0.len())]
    BulkWrite(Vec<WriteFailure>),

    /// Store unreachable, authentication failure, write concern failure...
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Bulk-insert capability of a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert documents in one round trip
    ///
    /// With `options.ordered` the store stops at the first rejection and
    /// later documents are not attempted. Otherwise every document not
    /// listed in [`StoreError::BulkWrite`] has been written.
    async fn insert_many(
        &self,
        documents: &[Document],
        options: &WriteOptions,
    ) -> Result<(), StoreError>;

    /// Store name for logging
    fn name(&self) -> &str;
}

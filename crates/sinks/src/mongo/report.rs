//! Outcome of a bulk write

use std::fmt;

use mongodb::bson::Document;

use super::store::WriteFailure;

/// The store's verdict on one rejected document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentError {
    pub code: i32,
    pub code_name: Option<String>,
    pub message: String,
}

impl From<&WriteFailure> for DocumentError {
    fn from(failure: &WriteFailure) -> Self {
        Self {
            code: failure.code,
            code_name: failure.code_name.clone(),
            message: failure.message.clone(),
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code_name {
            Some(name) => write!(f, "{} ({}): {}", name, self.code, self.message),
            None => write!(f, "code {}: {}", self.code, self.message),
        }
    }
}

/// Why a rejected document could not be recovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The store blamed a field outside the configured broken-field set
    UnlistedField(String),
    /// The store did not blame any field of the document
    Unattributed,
    /// Every candidate broken field was stripped and the document still fails
    CandidatesExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnlistedField(name) => write!(f, "field '{}' is not excludable", name),
            Self::Unattributed => f.write_str("rejection not attributable to a field"),
            Self::CandidatesExhausted => f.write_str("no excludable fields left to strip"),
        }
    }
}

/// A document written only after fields were stripped from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredDocument {
    /// 1-based position in the submitted batch
    pub ordinal: usize,
    /// Fields removed before the successful write, in removal order
    pub stripped_fields: Vec<String>,
}

/// A document that was not written
#[derive(Debug, Clone, PartialEq)]
pub struct PermanentFailure {
    /// 1-based position in the submitted batch
    pub ordinal: usize,
    /// The document exactly as submitted
    pub document: Document,
    /// The store's error for the final attempt
    pub error: DocumentError,
    pub reason: FailureReason,
}

/// Accounting for one call to `BulkWriter::write`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    /// Documents in the submitted batch
    pub submitted: usize,
    /// Documents written unchanged
    pub written: usize,
    /// Documents written after field reduction
    pub recovered: Vec<RecoveredDocument>,
    /// Documents that could not be written
    pub permanent: Vec<PermanentFailure>,
    /// Store round trips used
    pub rounds: usize,
}

impl WriteReport {
    /// Empty report for a batch of `submitted` documents
    pub fn new(submitted: usize) -> Self {
        Self {
            submitted,
            ..Self::default()
        }
    }

    /// Documents durably stored, reduced or not
    pub fn stored(&self) -> usize {
        self.written + self.recovered.len()
    }

    /// Number of permanent failures
    pub fn failed(&self) -> usize {
        self.permanent.len()
    }

    /// True when every document was written unchanged
    pub fn is_clean(&self) -> bool {
        self.recovered.is_empty() && self.permanent.is_empty()
    }

    /// Every submitted document is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.stored() + self.failed() == self.submitted
    }
}

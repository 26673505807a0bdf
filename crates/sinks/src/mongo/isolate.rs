//! Failure isolation
//!
//! Given a rejected document and the fields the store blamed, produce a
//! reduced copy with the excludable fields removed and a recovery
//! annotation added, or refuse.

use std::collections::BTreeSet;

use mongodb::bson::{Bson, Document};

use super::report::FailureReason;

/// Result of [`FailureIsolator::reduce`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// A new document ready for retry
    Reduced {
        document: Document,
        /// Fields removed by this reduction, sorted
        stripped: Vec<String>,
    },
    /// The document cannot be repaired by stripping fields
    NotReducible(FailureReason),
}

/// Strips configured broken fields from rejected documents
#[derive(Debug, Clone)]
pub struct FailureIsolator {
    broken_fields: BTreeSet<String>,
    annotation_key: String,
}

impl FailureIsolator {
    /// Create an isolator for the given broken-field set
    pub fn new(broken_fields: BTreeSet<String>, annotation_key: impl Into<String>) -> Self {
        Self {
            broken_fields,
            annotation_key: annotation_key.into(),
        }
    }

    /// Configured broken-field set
    pub fn broken_fields(&self) -> &BTreeSet<String> {
        &self.broken_fields
    }

    /// Key of the recovery annotation
    pub fn annotation_key(&self) -> &str {
        &self.annotation_key
    }

    /// Reduce `document` by removing the offending fields
    ///
    /// Every offending field must be in the broken-field set; a single
    /// unlisted field makes the document not reducible. The input is never
    /// modified. `ordinal` is the 1-based position in the original batch and
    /// is written under the annotation key.
    pub fn reduce(
        &self,
        document: &Document,
        offending: &BTreeSet<String>,
        ordinal: usize,
    ) -> Reduction {
        if offending.is_empty() {
            return Reduction::NotReducible(FailureReason::Unattributed);
        }

        if let Some(unlisted) = offending.difference(&self.broken_fields).next() {
            return Reduction::NotReducible(FailureReason::UnlistedField(unlisted.clone()));
        }

        let stripped: Vec<String> = offending
            .iter()
            .filter(|field| document.contains_key(field.as_str()))
            .cloned()
            .collect();

        if stripped.is_empty() {
            return Reduction::NotReducible(FailureReason::CandidatesExhausted);
        }

        let mut reduced: Document = document
            .iter()
            .filter(|(key, _)| !offending.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        reduced.insert(self.annotation_key.clone(), Bson::Int64(ordinal as i64));

        Reduction::Reduced {
            document: reduced,
            stripped,
        }
    }
}

#[cfg(test)]
#[path = "isolate_test.rs"]
mod isolate_test;

//! Bulk-write error classification
//!
//! Decides which top-level fields of a rejected document the store blamed.
//! The MongoDB wire format (codes, message wording, validation details) is
//! only interpreted here.

use std::collections::BTreeSet;

use mongodb::bson::{Bson, Document};
use once_cell::sync::Lazy;
use regex::Regex;

use super::store::WriteFailure;

/// Maps a write failure to the fields responsible for it
pub trait ErrorClassifier: Send + Sync {
    /// Top-level field names of `document` implicated by `failure`
    ///
    /// An empty set means the failure cannot be pinned on any field.
    fn implicated_fields(&self, failure: &WriteFailure, document: &Document) -> BTreeSet<String>;
}

/// BadValue
pub const CODE_BAD_VALUE: i32 = 2;
/// TypeMismatch
pub const CODE_TYPE_MISMATCH: i32 = 14;
/// DollarPrefixedFieldName
pub const CODE_DOLLAR_PREFIXED_FIELD: i32 = 52;
/// DottedFieldName
pub const CODE_DOTTED_FIELD: i32 = 57;
/// DocumentValidationFailure
pub const CODE_DOCUMENT_VALIDATION: i32 = 121;

/// Codes that describe a data-shape problem tied to a field
const FIELD_ERROR_CODES: [i32; 5] = [
    CODE_BAD_VALUE,
    CODE_TYPE_MISMATCH,
    CODE_DOLLAR_PREFIXED_FIELD,
    CODE_DOTTED_FIELD,
    CODE_DOCUMENT_VALIDATION,
];

/// Message shapes that name a field, in the order they are tried
///
/// `key` is the rejected key itself; `path`, when present, is where it sits
/// in the document.
static FIELD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "The dollar ($) prefixed field '$last' in 'a.$last' is not valid for storage."
        Regex::new(r"field(?: name)? '(?P<key>[^']+)'(?: in '(?P<path>[^']+)')?").unwrap(),
        // "Document can't have $ prefixed field names: $last"
        Regex::new(r"field names?: (?P<key>\S+)").unwrap(),
        // "'a' in 'a.b' ..."
        Regex::new(r"'(?P<key>[^']+)' in '(?P<path>[^']+)'").unwrap(),
    ]
});

/// Validation detail key naming a property that failed its schema
const PROPERTY_NAME_KEY: &str = "propertyName";

/// Validation detail key listing properties the schema does not allow
const ADDITIONAL_PROPERTIES_KEY: &str = "additionalProperties";

/// Classifier for MongoDB server errors
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoErrorClassifier;

impl MongoErrorClassifier {
    /// Create a classifier
    pub fn new() -> Self {
        Self
    }

    /// Whether `code` describes a field-level data problem
    pub fn is_field_error(code: i32) -> bool {
        FIELD_ERROR_CODES.contains(&code)
    }
}

impl ErrorClassifier for MongoErrorClassifier {
    fn implicated_fields(&self, failure: &WriteFailure, document: &Document) -> BTreeSet<String> {
        if !Self::is_field_error(failure.code) {
            return BTreeSet::new();
        }

        let mut names = Vec::new();
        if let Some(details) = &failure.details {
            collect_detail_names(details, &mut names);
        }
        if !names.is_empty() {
            return names
                .iter()
                .filter_map(|name| top_level_field(name, document))
                .collect();
        }

        message_fields(&failure.message, document)
    }
}

/// Top-level fields named by an error message
///
/// The first pattern that matches decides. For a key reported inside a
/// path, the path is resolved first and the bare key is the fallback.
fn message_fields(message: &str, document: &Document) -> BTreeSet<String> {
    for pattern in FIELD_PATTERNS.iter() {
        let mut matched = false;
        let mut fields = BTreeSet::new();

        for caps in pattern.captures_iter(message) {
            matched = true;
            let resolve = |group: &str| {
                caps.name(group)
                    .and_then(|m| top_level_field(clean_name(m.as_str()), document))
            };
            fields.extend(resolve("path").or_else(|| resolve("key")));
        }

        if matched {
            return fields;
        }
    }
    BTreeSet::new()
}

fn clean_name(name: &str) -> &str {
    name.trim_end_matches(['.', ','])
}

/// Walk schema validation details and collect offending property names
///
/// A named property is the blamed top-level field; the details beneath it
/// describe its own nested properties and are not walked.
fn collect_detail_names(details: &Document, out: &mut Vec<String>) {
    if let Ok(name) = details.get_str(PROPERTY_NAME_KEY) {
        out.push(name.to_string());
        return;
    }

    for (key, value) in details {
        if key == ADDITIONAL_PROPERTIES_KEY
            && let Bson::Array(names) = value
        {
            out.extend(names.iter().filter_map(Bson::as_str).map(str::to_string));
            continue;
        }
        collect_detail_value(value, out);
    }
}

fn collect_detail_value(value: &Bson, out: &mut Vec<String>) {
    match value {
        Bson::Document(doc) => collect_detail_names(doc, out),
        Bson::Array(items) => items.iter().for_each(|v| collect_detail_value(v, out)),
        _ => {}
    }
}

/// Resolve a reported name or path to a top-level key of `document`
///
/// An exact key wins (keys may legitimately contain dots when no dot
/// substitution is configured); otherwise the first path segment is used.
fn top_level_field(name: &str, document: &Document) -> Option<String> {
    if document.contains_key(name) {
        return Some(name.to_string());
    }
    let head = name.split('.').next()?;
    document.contains_key(head).then(|| head.to_string())
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod classify_test;

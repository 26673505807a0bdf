//! Key sanitization
//!
//! MongoDB refuses to store keys that start with `$` or contain `.`.
//! [`KeySanitizer`] rewrites those characters with configured substitutes,
//! walking nested documents and documents inside arrays. Values are never
//! touched.
//!
//! Substitution is lossy: `a.b` and `a_dot_b` both become `a_dot_b` when the
//! dot substitute is `_dot_`. Pick substitutes that cannot occur in real keys.

use std::borrow::Cow;

use mongodb::bson::{Bson, Document};

/// Rewrites forbidden characters in document keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySanitizer {
    /// Replacement for every `.` in a key
    dot: Option<String>,
    /// Replacement for a leading `$`
    dollar: Option<String>,
}

impl KeySanitizer {
    /// Create a sanitizer; `None` disables the corresponding rewrite
    pub fn new(dot: Option<String>, dollar: Option<String>) -> Self {
        Self { dot, dollar }
    }

    /// Set the replacement for `.`
    pub fn with_dot_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.dot = Some(replacement.into());
        self
    }

    /// Set the replacement for a leading `$`
    pub fn with_dollar_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.dollar = Some(replacement.into());
        self
    }

    /// True when no rewrite is configured and documents pass through as-is
    pub fn is_passthrough(&self) -> bool {
        self.dot.is_none() && self.dollar.is_none()
    }

    /// Sanitize a single key
    pub fn sanitize<'a>(&self, key: &'a str) -> Cow<'a, str> {
        let mut key = Cow::Borrowed(key);

        if let Some(dot) = &self.dot
            && key.contains('.')
        {
            key = Cow::Owned(key.replace('.', dot));
        }

        if let Some(dollar) = &self.dollar
            && let Some(rest) = key.strip_prefix('$')
        {
            key = Cow::Owned(format!("{dollar}{rest}"));
        }

        key
    }

    /// Sanitize every key of a document, recursively
    pub fn sanitize_document(&self, document: Document) -> Document {
        if self.is_passthrough() {
            return document;
        }

        document
            .into_iter()
            .map(|(key, value)| {
                let rewritten = match self.sanitize(&key) {
                    Cow::Owned(rewritten) => Some(rewritten),
                    Cow::Borrowed(_) => None,
                };
                (rewritten.unwrap_or(key), self.sanitize_value(value))
            })
            .collect()
    }

    /// Sanitize keys inside a value; scalars are returned unchanged
    pub fn sanitize_value(&self, value: Bson) -> Bson {
        match value {
            Bson::Document(doc) => Bson::Document(self.sanitize_document(doc)),
            Bson::Array(items) => {
                Bson::Array(items.into_iter().map(|v| self.sanitize_value(v)).collect())
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "sanitize_test.rs"]
mod sanitize_test;

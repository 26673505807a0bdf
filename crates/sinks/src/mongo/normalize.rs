//! Record normalization
//!
//! Turns a raw log record (a JSON object from upstream collection) into a
//! store-ready BSON document: keys sanitized, optional time and tag fields
//! injected.

use mongodb::bson::{Bson, DateTime, Document};
use serde::Deserialize;
use serde_json::Value;

use super::sanitize::KeySanitizer;

/// A raw record: string keys mapped to arbitrary nested JSON values
pub type Record = serde_json::Map<String, Value>;

/// A record as handed over by the upstream collector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    /// Routing tag
    pub tag: String,
    /// Event time, Unix epoch seconds
    pub time: i64,
    /// Record body
    pub record: Record,
}

impl LogRecord {
    /// Create a log record
    pub fn new(tag: impl Into<String>, time: i64, record: Record) -> Self {
        Self {
            tag: tag.into(),
            time,
            record,
        }
    }
}

/// Which synthetic fields to inject, and under which keys
///
/// `None` disables injection of that field. The two are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Key for the event time (stored as a BSON date)
    pub time_key: Option<String>,
    /// Key for the routing tag
    pub tag_key: Option<String>,
}

/// Builds store-ready documents from raw records
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    sanitizer: KeySanitizer,
    options: NormalizeOptions,
}

impl Normalizer {
    /// Create a normalizer
    pub fn new(sanitizer: KeySanitizer, options: NormalizeOptions) -> Self {
        Self { sanitizer, options }
    }

    /// Key sanitizer in use
    pub fn sanitizer(&self) -> &KeySanitizer {
        &self.sanitizer
    }

    /// Injection options in use
    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Normalize a record. Never fails; the input is left untouched.
    ///
    /// Injected fields are written after sanitization, so configured time
    /// and tag keys are stored verbatim and overwrite same-named record keys.
    pub fn normalize(&self, record: &Record, time: i64, tag: &str) -> Document {
        let mut document = self.sanitizer.sanitize_document(record_to_document(record));

        if let Some(time_key) = &self.options.time_key {
            document.insert(time_key.clone(), Bson::DateTime(epoch_seconds_to_date(time)));
        }

        if let Some(tag_key) = &self.options.tag_key {
            document.insert(tag_key.clone(), Bson::String(tag.to_string()));
        }

        document
    }

    /// Normalize a [`LogRecord`]
    pub fn normalize_log(&self, log: &LogRecord) -> Document {
        self.normalize(&log.record, log.time, &log.tag)
    }
}

/// Convert epoch seconds to a BSON date
pub fn epoch_seconds_to_date(seconds: i64) -> DateTime {
    DateTime::from_millis(seconds.saturating_mul(1000))
}

/// Deep-copy a JSON object into a BSON document
pub fn record_to_document(record: &Record) -> Document {
    record
        .iter()
        .map(|(key, value)| (key.clone(), json_to_bson(value)))
        .collect()
}

/// Convert a JSON value into the equivalent BSON value
///
/// Integers that fit in 32 bits are stored as `Int32`, larger ones as
/// `Int64`; unsigned values beyond `i64::MAX` fall back to `Double`.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Bson::Int32(small),
                    Err(_) => Bson::Int64(i),
                }
            } else {
                n.as_f64().map_or(Bson::Null, Bson::Double)
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(record_to_document(map)),
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod normalize_test;

//! MongoDB sink configuration
//!
//! Connection, naming, key-rewrite, recovery and batching settings.

use std::collections::BTreeSet;
use std::time::Duration;

use super::isolate::FailureIsolator;
use super::normalize::{NormalizeOptions, Normalizer};
use super::sanitize::KeySanitizer;
use super::store::WriteOptions;

// =============================================================================
// Constants
// =============================================================================

/// Default connection string
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017";

/// Default field name for injected timestamps
pub const DEFAULT_TIME_KEY: &str = "time";

/// Default field name for injected tags
pub const DEFAULT_TAG_KEY: &str = "tag";

/// Default annotation key on recovered documents
pub const DEFAULT_ANNOTATION_KEY: &str = "broken_bulk_inserted_sequence";

/// Default documents per flush
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default flush interval
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default retry attempts for fatal flush failures
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

// =============================================================================
// Configuration
// =============================================================================

/// Capped collection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedCollection {
    /// Maximum size in bytes
    pub size: u64,
    /// Maximum number of documents
    pub max: Option<u64>,
}

/// Configuration for the MongoDB sink
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection string (e.g., "mongodb://localhost:27017")
    pub connection_string: String,

    /// Database name
    pub database: String,

    /// Collection name
    pub collection: String,

    /// Field to receive the record time, if injected
    pub time_key: Option<String>,

    /// Field to receive the record tag, if injected
    pub tag_key: Option<String>,

    /// Replacement for `.` in keys
    pub replace_dot_in_key_with: Option<String>,

    /// Replacement for a leading `$` in keys
    pub replace_dollar_in_key_with: Option<String>,

    /// Top-level fields that may be stripped to rescue a document
    pub broken_fields: BTreeSet<String>,

    /// Key stamped on recovered documents
    pub annotation_key: String,

    /// Acknowledging nodes required per write
    pub write_concern: Option<u32>,

    /// Wait for journal commit
    pub journaled: bool,

    /// Stop each bulk write at the first rejection
    pub ordered: bool,

    /// Create the collection as capped if missing
    pub capped: Option<CappedCollection>,

    /// Documents buffered before a flush
    pub batch_size: usize,

    /// Flush interval
    pub flush_interval: Duration,

    /// Bound on each store round trip
    pub write_timeout: Option<Duration>,

    /// Number of retry attempts for fatal flush failures
    pub retry_attempts: usize,

    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,

    /// Maximum retry delay
    pub retry_max_delay: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.into(),
            database: String::new(),
            collection: String::new(),
            time_key: None,
            tag_key: None,
            replace_dot_in_key_with: None,
            replace_dollar_in_key_with: None,
            broken_fields: BTreeSet::new(),
            annotation_key: DEFAULT_ANNOTATION_KEY.into(),
            write_concern: None,
            journaled: false,
            ordered: false,
            capped: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            write_timeout: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

impl MongoConfig {
    /// Create a config targeting `database.collection`
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Set the connection string
    pub fn with_connection_string(mut self, uri: impl Into<String>) -> Self {
        self.connection_string = uri.into();
        self
    }

    /// Inject the record time under `key`
    pub fn with_time_key(mut self, key: impl Into<String>) -> Self {
        self.time_key = Some(key.into());
        self
    }

    /// Inject the record tag under `key`
    pub fn with_tag_key(mut self, key: impl Into<String>) -> Self {
        self.tag_key = Some(key.into());
        self
    }

    /// Replace `.` in keys
    pub fn with_dot_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replace_dot_in_key_with = Some(replacement.into());
        self
    }

    /// Replace a leading `$` in keys
    pub fn with_dollar_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replace_dollar_in_key_with = Some(replacement.into());
        self
    }

    /// Set the fields that may be stripped from rejected documents
    pub fn with_broken_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.broken_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the annotation key for recovered documents
    pub fn with_annotation_key(mut self, key: impl Into<String>) -> Self {
        self.annotation_key = key.into();
        self
    }

    /// Require `nodes` acknowledgements per write
    pub fn with_write_concern(mut self, nodes: u32) -> Self {
        self.write_concern = Some(nodes);
        self
    }

    /// Wait for journal commit
    pub fn with_journaled(mut self, journaled: bool) -> Self {
        self.journaled = journaled;
        self
    }

    /// Use ordered bulk writes
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Create the collection capped at `size` bytes
    pub fn with_capped(mut self, size: u64, max: Option<u64>) -> Self {
        self.capped = Some(CappedCollection { size, max });
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the flush interval
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Bound each store round trip
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Set the number of retry attempts
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the backoff bounds
    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    /// `database.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// Key sanitizer for these settings
    pub fn sanitizer(&self) -> KeySanitizer {
        KeySanitizer::new(
            self.replace_dot_in_key_with.clone(),
            self.replace_dollar_in_key_with.clone(),
        )
    }

    /// Record normalizer for these settings
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(
            self.sanitizer(),
            NormalizeOptions {
                time_key: self.time_key.clone(),
                tag_key: self.tag_key.clone(),
            },
        )
    }

    /// Failure isolator for these settings
    pub fn isolator(&self) -> FailureIsolator {
        FailureIsolator::new(self.broken_fields.clone(), self.annotation_key.clone())
    }

    /// Options passed to every bulk write
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            ordered: self.ordered,
            journaled: self.journaled,
            write_concern: self.write_concern,
        }
    }
}

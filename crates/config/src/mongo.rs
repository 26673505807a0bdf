//! MongoDB sink configuration
//!
//! The `[mongo]` section. Only `database` and `collection` are required.
//!
//! ```toml
//! [mongo]
//! connection_string = "mongodb://db1:27017,db2:27017/?replicaSet=rs0"
//! database = "logs"
//! collection = "access"
//! include_time_key = true
//! replace_dot_in_key_with = "_dot_"
//! replace_dollar_in_key_with = "_dollar_"
//! exclude_broken_fields = ["payload", "headers"]
//! write_concern = 2
//! flush_interval = "2s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// `[mongo]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MongoSinkConfig {
    /// Connection string; credentials and TLS options go here
    /// Default: "mongodb://localhost:27017"
    pub connection_string: String,

    /// Database name
    /// Required
    pub database: String,

    /// Collection name
    /// Required
    pub collection: String,

    /// Inject the record time into each document
    /// Default: false
    pub include_time_key: bool,

    /// Field receiving the record time
    /// Default: "time"
    pub time_key: String,

    /// Inject the record tag into each document
    /// Default: false
    pub include_tag_key: bool,

    /// Field receiving the record tag
    /// Default: "tag"
    pub tag_key: String,

    /// Top-level fields that may be stripped from a rejected document.
    /// A list, or a comma-separated string
    /// Default: empty (no recovery)
    #[serde(deserialize_with = "field_list")]
    pub exclude_broken_fields: Vec<String>,

    /// Replacement for `.` in keys
    pub replace_dot_in_key_with: Option<String>,

    /// Replacement for a leading `$` in keys
    pub replace_dollar_in_key_with: Option<String>,

    /// Key recording a recovered document's position in its batch
    /// Default: "broken_bulk_inserted_sequence"
    pub broken_bulk_inserted_sequence_key: String,

    /// Acknowledging nodes required per write
    /// Default: server default
    pub write_concern: Option<u32>,

    /// Wait for journal commit
    /// Default: false
    pub journaled: bool,

    /// Stop each bulk write at the first rejected document
    /// Default: false
    pub ordered: bool,

    /// Create the collection as capped if it does not exist
    /// Default: false
    pub capped: bool,

    /// Capped collection size in bytes
    /// Required when `capped`
    pub capped_size: Option<u64>,

    /// Capped collection document limit
    pub capped_max: Option<u64>,

    /// Documents per flush
    /// Default: 1000
    pub batch_size: usize,

    /// Flush interval
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Bound on each bulk write round trip
    /// Default: none
    #[serde(with = "humantime_serde")]
    pub write_timeout: Option<Duration>,

    /// Retries for a flush that failed as a whole
    /// Default: 3
    pub retry_attempts: usize,

    /// First retry delay, doubled per attempt
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Retry delay ceiling
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
}

impl Default for MongoSinkConfig {
    fn default() -> Self {
        Self {
            connection_string: "mongodb://localhost:27017".into(),
            database: String::new(),
            collection: String::new(),
            include_time_key: false,
            time_key: "time".into(),
            include_tag_key: false,
            tag_key: "tag".into(),
            exclude_broken_fields: Vec::new(),
            replace_dot_in_key_with: None,
            replace_dollar_in_key_with: None,
            broken_bulk_inserted_sequence_key: "broken_bulk_inserted_sequence".into(),
            write_concern: None,
            journaled: false,
            ordered: false,
            capped: false,
            capped_size: None,
            capped_max: None,
            batch_size: 1000,
            flush_interval: Duration::from_secs(5),
            write_timeout: None,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

impl MongoSinkConfig {
    /// Time field name, if time injection is on
    pub fn time_key(&self) -> Option<&str> {
        self.include_time_key.then_some(self.time_key.as_str())
    }

    /// Tag field name, if tag injection is on
    pub fn tag_key(&self) -> Option<&str> {
        self.include_tag_key.then_some(self.tag_key.as_str())
    }
}

/// Accept `["a", "b"]` or `"a, b"`
fn field_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match FieldList::deserialize(deserializer)? {
        FieldList::List(fields) => fields,
        FieldList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> MongoSinkConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config, MongoSinkConfig::default());
        assert_eq!(config.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.broken_bulk_inserted_sequence_key, "broken_bulk_inserted_sequence");
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert!(config.time_key().is_none());
        assert!(config.tag_key().is_none());
    }

    #[test]
    fn test_full_section() {
        let config = parse(
            r#"
connection_string = "mongodb://db:27017"
database = "logs"
collection = "access"
include_time_key = true
time_key = "@timestamp"
include_tag_key = true
exclude_broken_fields = ["payload", "headers"]
replace_dot_in_key_with = "_dot_"
replace_dollar_in_key_with = "_dollar_"
write_concern = 2
journaled = true
ordered = true
capped = true
capped_size = 1048576
capped_max = 5000
batch_size = 200
flush_interval = "2s"
write_timeout = "30s"
retry_attempts = 5
retry_base_delay = "250ms"
retry_max_delay = "1m"
"#,
        );

        assert_eq!(config.time_key(), Some("@timestamp"));
        assert_eq!(config.tag_key(), Some("tag"));
        assert_eq!(config.exclude_broken_fields, vec!["payload", "headers"]);
        assert_eq!(config.replace_dot_in_key_with.as_deref(), Some("_dot_"));
        assert_eq!(config.write_concern, Some(2));
        assert!(config.journaled && config.ordered && config.capped);
        assert_eq!(config.capped_size, Some(1_048_576));
        assert_eq!(config.capped_max, Some(5000));
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.write_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
        assert_eq!(config.retry_max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_broken_fields_comma_separated() {
        let config = parse(r#"exclude_broken_fields = "payload, headers,,body""#);
        assert_eq!(config.exclude_broken_fields, vec!["payload", "headers", "body"]);
    }

    #[test]
    fn test_unknown_duration_rejected() {
        let result: Result<MongoSinkConfig, _> = toml::from_str(r#"flush_interval = "soon""#);
        assert!(result.is_err());
    }
}

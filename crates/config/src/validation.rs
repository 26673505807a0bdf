//! Configuration validation
//!
//! Checks the `[mongo]` section for:
//! - Required names are present
//! - Key substitutes actually remove the forbidden characters
//! - Capped collections have a size
//! - Batching values are usable

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::mongo::MongoSinkConfig;

const SECTION: &str = "mongo";

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_mongo(&config.mongo)
}

fn validate_mongo(mongo: &MongoSinkConfig) -> Result<()> {
    if mongo.connection_string.trim().is_empty() {
        return Err(ConfigError::missing_field(SECTION, "connection_string"));
    }
    if mongo.database.is_empty() {
        return Err(ConfigError::missing_field(SECTION, "database"));
    }
    if mongo.collection.is_empty() {
        return Err(ConfigError::missing_field(SECTION, "collection"));
    }

    validate_substitute("replace_dot_in_key_with", mongo.replace_dot_in_key_with.as_deref())?;
    validate_substitute(
        "replace_dollar_in_key_with",
        mongo.replace_dollar_in_key_with.as_deref(),
    )?;

    if mongo.include_time_key && mongo.time_key.is_empty() {
        return Err(ConfigError::invalid_value(SECTION, "time_key", "must not be empty"));
    }
    if mongo.include_tag_key && mongo.tag_key.is_empty() {
        return Err(ConfigError::invalid_value(SECTION, "tag_key", "must not be empty"));
    }
    if mongo.broken_bulk_inserted_sequence_key.is_empty() {
        return Err(ConfigError::invalid_value(
            SECTION,
            "broken_bulk_inserted_sequence_key",
            "must not be empty",
        ));
    }
    if mongo.exclude_broken_fields.iter().any(|f| f.is_empty()) {
        return Err(ConfigError::invalid_value(
            SECTION,
            "exclude_broken_fields",
            "field names must not be empty",
        ));
    }

    if mongo.capped {
        match mongo.capped_size {
            None => return Err(ConfigError::missing_field(SECTION, "capped_size")),
            Some(0) => {
                return Err(ConfigError::invalid_value(
                    SECTION,
                    "capped_size",
                    "must be greater than 0",
                ));
            }
            Some(_) => {}
        }
    }

    if mongo.write_concern == Some(0) && mongo.journaled {
        return Err(ConfigError::invalid_value(
            SECTION,
            "write_concern",
            "unacknowledged writes cannot be journaled",
        ));
    }
    if mongo.batch_size == 0 {
        return Err(ConfigError::invalid_value(SECTION, "batch_size", "must be greater than 0"));
    }
    if mongo.flush_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            SECTION,
            "flush_interval",
            "must be greater than 0",
        ));
    }
    if mongo.retry_base_delay > mongo.retry_max_delay {
        return Err(ConfigError::invalid_value(
            SECTION,
            "retry_base_delay",
            "must not exceed retry_max_delay",
        ));
    }

    Ok(())
}

/// A substitute must not reintroduce what it replaces
fn validate_substitute(field: &'static str, substitute: Option<&str>) -> Result<()> {
    let Some(substitute) = substitute else {
        return Ok(());
    };

    if substitute.is_empty() {
        return Err(ConfigError::invalid_value(SECTION, field, "must not be empty"));
    }
    if substitute.contains('.') {
        return Err(ConfigError::invalid_value(SECTION, field, "must not contain '.'"));
    }
    if substitute.starts_with('$') {
        return Err(ConfigError::invalid_value(SECTION, field, "must not start with '$'"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod validation_test;

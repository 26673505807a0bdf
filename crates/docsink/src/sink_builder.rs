//! Builds the runtime sink config from the `[mongo]` section

use docsink_config::MongoSinkConfig;
use docsink_sinks::MongoConfig;

/// Map the validated `[mongo]` section onto the sink's runtime config
pub fn mongo_config(section: &MongoSinkConfig) -> MongoConfig {
    let mut config = MongoConfig::new(&section.database, &section.collection)
        .with_connection_string(&section.connection_string)
        .with_broken_fields(section.exclude_broken_fields.iter().cloned())
        .with_annotation_key(&section.broken_bulk_inserted_sequence_key)
        .with_journaled(section.journaled)
        .with_ordered(section.ordered)
        .with_batch_size(section.batch_size)
        .with_flush_interval(section.flush_interval)
        .with_retry_attempts(section.retry_attempts)
        .with_retry_delays(section.retry_base_delay, section.retry_max_delay);

    if let Some(key) = section.time_key() {
        config = config.with_time_key(key);
    }
    if let Some(key) = section.tag_key() {
        config = config.with_tag_key(key);
    }
    if let Some(dot) = &section.replace_dot_in_key_with {
        config = config.with_dot_replacement(dot);
    }
    if let Some(dollar) = &section.replace_dollar_in_key_with {
        config = config.with_dollar_replacement(dollar);
    }
    if let Some(nodes) = section.write_concern {
        config = config.with_write_concern(nodes);
    }
    if section.capped
        && let Some(size) = section.capped_size
    {
        config = config.with_capped(size, section.capped_max);
    }
    if let Some(timeout) = section.write_timeout {
        config = config.with_write_timeout(timeout);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn section() -> MongoSinkConfig {
        MongoSinkConfig {
            database: "logs".into(),
            collection: "access".into(),
            ..MongoSinkConfig::default()
        }
    }

    #[test]
    fn test_defaults_carried_over() {
        let config = mongo_config(&section());
        assert_eq!(config.namespace(), "logs.access");
        assert_eq!(config.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.annotation_key, "broken_bulk_inserted_sequence");
        assert!(config.time_key.is_none());
        assert!(config.tag_key.is_none());
        assert!(config.capped.is_none());
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn test_all_options_mapped() {
        let mut s = section();
        s.include_time_key = true;
        s.include_tag_key = true;
        s.tag_key = "source".into();
        s.exclude_broken_fields = vec!["payload".into()];
        s.replace_dot_in_key_with = Some("_".into());
        s.write_concern = Some(3);
        s.capped = true;
        s.capped_size = Some(1 << 20);
        s.write_timeout = Some(Duration::from_secs(2));

        let config = mongo_config(&s);
        assert_eq!(config.time_key.as_deref(), Some("time"));
        assert_eq!(config.tag_key.as_deref(), Some("source"));
        assert!(config.broken_fields.contains("payload"));
        assert_eq!(config.replace_dot_in_key_with.as_deref(), Some("_"));
        assert_eq!(config.write_options().write_concern, Some(3));
        assert_eq!(config.capped.map(|c| c.size), Some(1 << 20));
        assert_eq!(config.write_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_capped_size_ignored_unless_capped() {
        let mut s = section();
        s.capped_size = Some(4096);
        assert!(mongo_config(&s).capped.is_none());
    }
}

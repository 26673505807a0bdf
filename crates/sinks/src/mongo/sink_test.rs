//! Tests for the MongoDB sink run loop

use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::{Bson, doc};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::*;
use crate::mongo::testing::MemoryStore;

const TIME: i64 = 1_293_974_055;

fn log(value: Value) -> LogRecord {
    let Value::Object(record) = value else {
        panic!("record must be an object");
    };
    LogRecord::new("app.access", TIME, record)
}

fn config() -> MongoConfig {
    MongoConfig::new("logs", "access")
        .with_flush_interval(Duration::from_secs(3600))
        .with_retry_delays(Duration::from_millis(10), Duration::from_millis(40))
}

fn sink(config: MongoConfig, store: Arc<MemoryStore>) -> (MongoSink, mpsc::Sender<Vec<LogRecord>>) {
    let (tx, rx) = mpsc::channel(16);
    (MongoSink::new(config, store, rx), tx)
}

#[tokio::test]
async fn test_final_flush_on_close() {
    let store = Arc::new(MemoryStore::new());
    let (sink, tx) = sink(config(), store.clone());

    tx.send(vec![log(json!({"n": 1})), log(json!({"n": 2}))]).await.unwrap();
    tx.send(vec![log(json!({"n": 3}))]).await.unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();

    assert_eq!(snapshot.batches_received, 2);
    assert_eq!(snapshot.records_received, 3);
    assert_eq!(snapshot.documents_written, 3);
    assert_eq!(snapshot.flushes, 1);
    assert_eq!(
        store.documents(),
        vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }]
    );
}

#[tokio::test]
async fn test_nothing_received_nothing_written() {
    let store = Arc::new(MemoryStore::new());
    let (sink, tx) = sink(config(), store.clone());
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot, MetricsSnapshot::default());
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_at_batch_size() {
    let store = Arc::new(MemoryStore::new());
    let (sink, tx) = sink(config().with_batch_size(2), store.clone());
    let handle = sink.metrics_handle();
    let task = tokio::spawn(sink.run());

    tx.send(vec![log(json!({"n": 1}))]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(store.documents().is_empty());

    tx.send(vec![log(json!({"n": 2}))]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(store.documents().len(), 2);
    assert_eq!(handle.snapshot().flushes, 1);

    drop(tx);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_oversized_chunk_split_into_batches() {
    let store = Arc::new(MemoryStore::new());
    let (sink, tx) = sink(config().with_batch_size(2), store.clone());

    let chunk = (1..=5).map(|n| log(json!({"n": n}))).collect();
    tx.send(chunk).await.unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();

    let sizes: Vec<usize> = store.calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(snapshot.flushes, 3);
    assert_eq!(snapshot.documents_written, 5);
    assert_eq!(store.documents()[4], doc! { "n": 5 });
}

#[tokio::test(start_paused = true)]
async fn test_flush_on_interval() {
    let store = Arc::new(MemoryStore::new());
    let config = config().with_flush_interval(Duration::from_secs(5));
    let (sink, tx) = sink(config, store.clone());
    let task = tokio::spawn(sink.run());

    tx.send(vec![log(json!({"n": 1}))]).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(store.documents(), vec![doc! { "n": 1 }]);

    drop(tx);
    let snapshot = task.await.unwrap().unwrap();
    assert_eq!(snapshot.flushes, 1);
}

#[tokio::test]
async fn test_normalized_and_recovered() {
    let store = Arc::new(MemoryStore::new().reject_field("a"));
    let config = config()
        .with_tag_key("tag")
        .with_time_key("time")
        .with_dollar_replacement("_$")
        .with_broken_fields(["a"]);
    let (sink, tx) = sink(config, store.clone());

    tx.send(vec![
        log(json!({"ok": true})),
        log(json!({"a": 3, "b": "c", "$last": "x"})),
    ])
    .await
    .unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot.documents_written, 1);
    assert_eq!(snapshot.documents_recovered, 1);
    assert_eq!(snapshot.permanent_failures, 0);
    assert_eq!(snapshot.retry_rounds, 1);

    let docs = store.documents();
    let recovered = &docs[1];
    assert!(!recovered.contains_key("a"));
    assert_eq!(recovered.get_str("_$last").unwrap(), "x");
    assert_eq!(recovered.get_str("tag").unwrap(), "app.access");
    assert_eq!(
        recovered.get("time"),
        Some(&Bson::DateTime(mongodb::bson::DateTime::from_millis(TIME * 1000)))
    );
    assert_eq!(recovered.get_i64("broken_bulk_inserted_sequence").unwrap(), 2);
}

#[tokio::test]
async fn test_permanent_failure_counted() {
    let store = Arc::new(MemoryStore::new().reject_field("secret"));
    let (sink, tx) = sink(config(), store.clone());

    tx.send(vec![log(json!({"secret": 1})), log(json!({"n": 1}))])
        .await
        .unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot.permanent_failures, 1);
    assert_eq!(snapshot.documents_written, 1);
    assert_eq!(snapshot.dropped_documents, 0);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_flush_retried() {
    let store = Arc::new(MemoryStore::new().fail_fatally(2));
    let (sink, tx) = sink(config().with_retry_attempts(3), store.clone());

    tx.send(vec![log(json!({"n": 1}))]).await.unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot.fatal_errors, 2);
    assert_eq!(snapshot.documents_written, 1);
    assert_eq!(snapshot.dropped_documents, 0);
    assert_eq!(store.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_batch_dropped_after_retries() {
    let store = Arc::new(MemoryStore::new().fail_fatally(100));
    let (sink, tx) = sink(config().with_retry_attempts(2), store.clone());

    tx.send(vec![log(json!({"n": 1})), log(json!({"n": 2}))])
        .await
        .unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot.fatal_errors, 3);
    assert_eq!(snapshot.dropped_documents, 2);
    assert_eq!(snapshot.flushes, 0);
    assert_eq!(store.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_retried_then_dropped() {
    let store = Arc::new(MemoryStore::new().with_delay(Duration::from_secs(60)));
    let config = config()
        .with_write_timeout(Duration::from_secs(1))
        .with_retry_attempts(1);
    let (sink, tx) = sink(config, store);

    tx.send(vec![log(json!({"n": 1}))]).await.unwrap();
    drop(tx);

    let snapshot = sink.run().await.unwrap();
    assert_eq!(snapshot.fatal_errors, 2);
    assert_eq!(snapshot.dropped_documents, 1);
}

#[tokio::test]
async fn test_write_options_forwarded() {
    let store = Arc::new(MemoryStore::new());
    let config = config().with_ordered(true).with_write_concern(2).with_journaled(true);
    let (sink, tx) = sink(config, store.clone());

    tx.send(vec![log(json!({"n": 1}))]).await.unwrap();
    drop(tx);
    sink.run().await.unwrap();

    let seen = store.options_seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].ordered);
    assert!(seen[0].journaled);
    assert_eq!(seen[0].write_concern, Some(2));
}

//! Tests for NDJSON input

use std::future::pending;

use serde_json::json;

use super::*;

const NOW: i64 = 1_700_000_000;

#[test]
fn test_parse_full_envelope() {
    let record = parse_line(
        r#"{"tag": "app.access", "time": 1293974055, "record": {"path": "/", "status": 200}}"#,
        NOW,
    )
    .unwrap()
    .unwrap();

    assert_eq!(record.tag, "app.access");
    assert_eq!(record.time, 1_293_974_055);
    assert_eq!(Value::Object(record.record), json!({"path": "/", "status": 200}));
}

#[test]
fn test_parse_defaults() {
    let record = parse_line(r#"{"record": {"a": 1}}"#, NOW).unwrap().unwrap();
    assert_eq!(record.tag, DEFAULT_TAG);
    assert_eq!(record.time, NOW);
}

#[test]
fn test_parse_fractional_time() {
    let record = parse_line(r#"{"time": 1293974055.75, "record": {}}"#, NOW)
        .unwrap()
        .unwrap();
    assert_eq!(record.time, 1_293_974_055);
}

#[test]
fn test_parse_bare_object_drops_envelope_keys() {
    let record = parse_line(r#"{"tag": "x", "time": 1293974055, "msg": "hi"}"#, NOW)
        .unwrap()
        .unwrap();
    assert_eq!(record.tag, "x");
    assert_eq!(record.time, 1_293_974_055);
    assert_eq!(Value::Object(record.record), json!({"msg": "hi"}));
}

#[test]
fn test_parse_mistyped_envelope_keys_kept() {
    let record = parse_line(r#"{"tag": 7, "time": "yesterday", "msg": "hi"}"#, NOW)
        .unwrap()
        .unwrap();
    assert_eq!(record.tag, DEFAULT_TAG);
    assert_eq!(record.time, NOW);
    assert_eq!(
        Value::Object(record.record),
        json!({"tag": 7, "time": "yesterday", "msg": "hi"})
    );
}

#[test]
fn test_parse_non_object_record_kept() {
    let record = parse_line(r#"{"record": "plain text"}"#, NOW).unwrap().unwrap();
    assert_eq!(Value::Object(record.record), json!({"record": "plain text"}));
}

#[test]
fn test_parse_blank_and_malformed() {
    assert!(parse_line("   ", NOW).unwrap().is_none());
    assert!(parse_line("{not json", NOW).is_err());
    assert!(parse_line("[1, 2]", NOW).is_err());
}

#[tokio::test]
async fn test_forward_chunks_and_skips() {
    let input = b"{\"record\": {\"n\": 1}}\n\
                  garbage\n\
                  {\"record\": {\"n\": 2}}\n\
                  \n\
                  {\"record\": {\"n\": 3}}\n";
    let (tx, mut rx) = mpsc::channel(8);

    let stats = forward(&input[..], tx, 2, pending()).await.unwrap();

    assert_eq!(
        stats,
        InputStats {
            lines: 5,
            records: 3,
            skipped: 1,
        }
    );
    assert_eq!(rx.recv().await.unwrap().len(), 2);
    assert_eq!(rx.recv().await.unwrap().len(), 1);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_forward_stops_on_shutdown() {
    // Reader that never yields a line
    let (_writer, reader) = tokio::io::duplex(64);
    let reader = tokio::io::BufReader::new(reader);
    let (tx, mut rx) = mpsc::channel(8);

    let stats = forward(reader, tx, 10, async {}).await.unwrap();

    assert_eq!(stats, InputStats::default());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_forward_fails_when_sink_gone() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = forward(&b"{\"record\": {}}\n"[..], tx, 1, pending()).await;
    assert!(result.is_err());
}

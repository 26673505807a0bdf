//! NDJSON input
//!
//! One record per line:
//!
//! ```text
//! {"tag": "app.access", "time": 1293974055, "record": {"path": "/", "status": 200}}
//! ```
//!
//! `time` (Unix seconds) defaults to now and `tag` to [`DEFAULT_TAG`]. A line
//! without a `record` object is stored whole, minus the `tag` and `time`
//! envelope keys.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use docsink_sinks::LogRecord;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Tag for lines that carry none
pub const DEFAULT_TAG: &str = "docsink";

/// Send a partial chunk after this long without a full one
pub const CHUNK_LINGER: Duration = Duration::from_secs(1);

/// Counters for one input run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    pub lines: u64,
    pub records: u64,
    pub skipped: u64,
}

/// Parse one input line; blank lines yield `None`
pub fn parse_line(line: &str, now: i64) -> Result<Option<LogRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line).context("invalid JSON")?;
    let Value::Object(mut object) = value else {
        return Err(anyhow!("expected a JSON object"));
    };

    // Envelope keys of another type are left in the record
    let tag = match object.remove("tag") {
        Some(Value::String(tag)) => tag,
        Some(other) => {
            object.insert("tag".into(), other);
            DEFAULT_TAG.to_string()
        }
        None => DEFAULT_TAG.to_string(),
    };
    let time = match object.remove("time") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(now),
        Some(other) => {
            object.insert("time".into(), other);
            now
        }
        None => now,
    };

    let record = match object.remove("record") {
        Some(Value::Object(record)) => record,
        Some(other) => {
            object.insert("record".into(), other);
            object
        }
        None => object,
    };

    Ok(Some(LogRecord::new(tag, time, record)))
}

/// Read lines until EOF or `shutdown`, sending chunks of `chunk_size` records
///
/// The last partial chunk is always sent. Dropping `tx` on return closes the
/// sink's channel.
pub async fn forward<R, S>(
    reader: R,
    tx: mpsc::Sender<Vec<LogRecord>>,
    chunk_size: usize,
    shutdown: S,
) -> Result<InputStats>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let chunk_size = chunk_size.max(1);
    let mut lines = reader.lines();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut stats = InputStats::default();
    let mut linger = tokio::time::interval_at(tokio::time::Instant::now() + CHUNK_LINGER, CHUNK_LINGER);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                stats.lines += 1;

                match parse_line(&line, chrono::Utc::now().timestamp()) {
                    Ok(Some(record)) => {
                        stats.records += 1;
                        chunk.push(record);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        stats.skipped += 1;
                        tracing::warn!(line = stats.lines, error = %e, "skipping malformed input line");
                    }
                }

                if chunk.len() >= chunk_size {
                    send(&tx, &mut chunk, chunk_size).await?;
                }
            }
            _ = linger.tick(), if !chunk.is_empty() => {
                send(&tx, &mut chunk, chunk_size).await?;
            }
            _ = &mut shutdown => {
                tracing::info!("input interrupted");
                break;
            }
        }
    }

    if !chunk.is_empty() {
        send(&tx, &mut chunk, chunk_size).await?;
    }
    Ok(stats)
}

async fn send(
    tx: &mpsc::Sender<Vec<LogRecord>>,
    chunk: &mut Vec<LogRecord>,
    chunk_size: usize,
) -> Result<()> {
    let full = std::mem::replace(chunk, Vec::with_capacity(chunk_size));
    tx.send(full)
        .await
        .map_err(|_| anyhow!("sink stopped accepting records"))
}

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

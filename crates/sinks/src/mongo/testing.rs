//! In-memory document store for tests

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::Document;
use parking_lot::Mutex;

use super::classify::CODE_BAD_VALUE;
use super::store::{DocumentStore, StoreError, WriteFailure, WriteOptions};

/// Reject any document carrying `trigger` with `code` and `message`
#[derive(Debug, Clone)]
struct Rejection {
    trigger: String,
    code: i32,
    message: String,
}

#[derive(Debug, Default)]
struct State {
    documents: Vec<Document>,
    calls: Vec<Vec<Document>>,
    options: Vec<WriteOptions>,
    rejections: Vec<Rejection>,
    fatal_calls: usize,
    delay: Option<Duration>,
}

/// Scriptable [`DocumentStore`]
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject documents containing `field`, blaming that field
    pub(crate) fn reject_field(self, field: &str) -> Self {
        self.reject_when(field, field, CODE_BAD_VALUE)
    }

    /// Reject documents containing `trigger`, blaming `blamed` with `code`
    pub(crate) fn reject_when(self, trigger: &str, blamed: &str, code: i32) -> Self {
        self.reject_with_message(trigger, code, format!("invalid value for field '{blamed}'"))
    }

    /// Reject documents containing `trigger` with a server message verbatim
    pub(crate) fn reject_with_message(
        self,
        trigger: &str,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        self.state.lock().rejections.push(Rejection {
            trigger: trigger.into(),
            code,
            message: message.into(),
        });
        self
    }

    /// Fail the next `calls` round trips with a transport error
    pub(crate) fn fail_fatally(self, calls: usize) -> Self {
        self.state.lock().fatal_calls = calls;
        self
    }

    /// Sleep before answering each call
    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    /// Everything written so far
    pub(crate) fn documents(&self) -> Vec<Document> {
        self.state.lock().documents.clone()
    }

    /// Batches submitted per call
    pub(crate) fn calls(&self) -> Vec<Vec<Document>> {
        self.state.lock().calls.clone()
    }

    /// Options seen per call
    pub(crate) fn options_seen(&self) -> Vec<WriteOptions> {
        self.state.lock().options.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_many(
        &self,
        documents: &[Document],
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.calls.push(documents.to_vec());
        state.options.push(*options);

        if state.fatal_calls > 0 {
            state.fatal_calls -= 1;
            return Err(StoreError::transport("connection refused"));
        }

        let mut failures = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            let rejection = state
                .rejections
                .iter()
                .find(|r| doc.contains_key(&r.trigger))
                .cloned();

            match rejection {
                Some(r) => {
                    failures.push(WriteFailure::new(index, r.code, r.message));
                    if options.ordered {
                        break;
                    }
                }
                None => state.documents.push(doc.clone()),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::BulkWrite(failures))
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

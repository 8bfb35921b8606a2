//! In-memory transport for tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{Transport, TransportError, TransportResult};

/// Replays queued responses and records every request body
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    responses: Mutex<VecDeque<TransportResult<Value>>>,
    requests: Mutex<Vec<Value>>,
    paths: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, response: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn fail(&self, error: TransportError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    fn next_response(&self) -> TransportResult<Value> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!([])))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, body: &Value) -> TransportResult<Value> {
        self.requests.lock().unwrap().push(body.clone());
        self.next_response()
    }

    async fn get_json(&self, path: &str) -> TransportResult<Value> {
        self.paths.lock().unwrap().push(format!("GET {}", path));
        self.next_response()
    }

    async fn delete(&self, path: &str) -> TransportResult<()> {
        self.paths.lock().unwrap().push(format!("DELETE {}", path));
        self.next_response().map(|_| ())
    }

    fn endpoint(&self) -> &str {
        "memory://druid"
    }
}

/// A select response page carrying `events` rows and a continuation token
pub(crate) fn select_page(offset: i64, events: usize) -> Value {
    let events: Vec<Value> = (0..events)
        .map(|i| json!({"segmentId": "seg", "offset": i, "event": {"row": i}}))
        .collect();
    json!([{
        "timestamp": "2020-01-01T00:00:00.000Z",
        "result": {"pagingIdentifiers": {"seg": offset}, "events": events}
    }])
}

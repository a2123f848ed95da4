use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Error shape recorded into a [`TraceRecord`]. Distinguishes an HTTP
/// response error (carrying status, body, and URL) from a generic failure,
/// mirroring the distinction the teacher's `CodexErr` makes between a
/// transport-level failure and everything else.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedError {
    Http {
        status: u16,
        body: String,
        url: String,
    },
    Generic {
        message: String,
    },
}

/// Per-turn lifecycle object: created at turn start, mutated through
/// streaming, finalized and emitted to the `llm_requests` log sink at
/// completion or error. All records share a fresh id so individual turns can
/// be correlated across the `streaming_progress` and `llm_requests` sinks.
pub struct TraceRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    request: Option<Value>,
    response: Option<Value>,
    input_tokens: usize,
    output_tokens: usize,
    error: Option<RecordedError>,
}

impl TraceRecord {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request: None,
            response: None,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Serializes `req` via the shared JSON encoder. A serialization failure
    /// is logged and never escapes: the request is recorded as absent
    /// rather than aborting the turn.
    pub fn record_request(&mut self, req: &impl Serialize) {
        match serde_json::to_value(req) {
            Ok(value) => self.request = Some(value),
            Err(err) => tracing::warn!(target: "llm_requests", "failed to serialize request: {err}"),
        }
    }

    pub fn record_response(&mut self, resp: &impl Serialize) {
        match serde_json::to_value(resp) {
            Ok(value) => self.response = Some(value),
            Err(err) => tracing::warn!(target: "llm_requests", "failed to serialize response: {err}"),
        }
    }

    pub fn record_error(&mut self, err: RecordedError) {
        self.error = Some(err);
    }

    pub fn set_input_token_count(&mut self, count: usize) {
        self.input_tokens = count;
    }

    pub fn input_token_count(&self) -> usize {
        self.input_tokens
    }

    pub fn set_output_token_count(&mut self, count: usize) {
        self.output_tokens = count;
    }

    pub fn output_token_count(&self) -> usize {
        self.output_tokens
    }

    /// Finalizes the record and emits it as a single structured JSON line to
    /// the `llm_requests` tracing target. Returns the emitted JSON value so
    /// callers (and tests) can inspect what was logged without re-parsing a
    /// log line.
    pub fn finish(self) -> Value {
        let blob = serde_json::json!({
            "id": self.id.to_string(),
            "created_at": self.created_at.to_rfc3339(),
            "request": self.request,
            "response": self.response,
            "input_tokens": self.input_tokens,
            "output_tokens": self.output_tokens,
            "error": self.error.as_ref().map(|e| serde_json::to_value(e).unwrap_or(Value::Null)),
        });
        tracing::info!(target: "llm_requests", record = %blob, "turn completed");
        blob
    }
}

impl Default for TraceRecord {
    fn default() -> Self {
        Self::new()
    }
}

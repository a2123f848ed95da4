use std::collections::HashMap;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CoreError;
use crate::error::Result;
use crate::event_bus::EventBus;
use crate::event_bus::PlanException;
use crate::message::Message;
use crate::message::ToolCall;
use crate::token_accountant::TokenAccountant;
use crate::trace_recorder::RecordedError;
use crate::trace_recorder::TraceRecord;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);
const TEXT_TAIL_CHARS: usize = 100;

/// Aggregate-level usage, updated by "most recent positive reading" across
/// partials for each field independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl Usage {
    fn merge_from(&mut self, other: &Usage) {
        if let Some(v) = other.prompt_tokens.filter(|v| *v > 0) {
            self.prompt_tokens = Some(v);
        }
        if let Some(v) = other.completion_tokens.filter(|v| *v > 0) {
            self.completion_tokens = Some(v);
        }
        if let Some(v) = other.total_tokens.filter(|v| *v > 0) {
            self.total_tokens = Some(v);
        }
    }
}

/// One element of the streaming response sequence. Deltas are additive;
/// later non-empty scalar fields supersede earlier ones for `id`/`model`;
/// `rate_limit` retains the first non-empty value seen.
#[derive(Debug, Clone, Default)]
pub struct PartialResponse {
    pub delta_text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub generation_metadata: Option<Value>,
    pub usage: Option<Usage>,
    pub id: Option<String>,
    pub model: Option<String>,
    pub rate_limit: Option<Value>,
}

/// The fixed point of aggregation.
#[derive(Debug, Clone)]
pub struct MergedResponse {
    pub message: Message,
    pub usage: Usage,
    pub id: Option<String>,
    pub model: Option<String>,
    pub prompt_metadata: Option<Value>,
    pub rate_limit: Option<Value>,
    pub output_token_count: usize,
    pub early_terminated: bool,
}

/// Progress telemetry emitted at most once per 10 seconds of elapsed
/// wall-clock time since the previous emission.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub elapsed: Duration,
    pub partials_seen: usize,
    pub text_len: usize,
    pub chars_per_sec: f64,
    pub tool_call_count: usize,
    pub tool_call_descriptors: Vec<String>,
    pub text_tail: String,
}

/// Capability gate for early termination on assistant text with no tool
/// calls. Permanently disabled: this field exists so the struct shape
/// matches a future configuration key, but no code path in this crate ever
/// sets it to `true`, and it has no effect in text-only mode regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatorOptions {
    pub early_terminate_on_thinking_only: bool,
}

/// Caller-held handle used to cancel an in-flight aggregation. Cancellation
/// is normal termination, not an error: the aggregator returns whatever it
/// had merged so far with `early_terminated = true`.
pub struct Canceller(watch::Sender<bool>);

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

#[derive(Clone)]
pub struct CancellationSignal(watch::Receiver<bool>);

pub fn cancellation_pair() -> (Canceller, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller(tx), CancellationSignal(rx))
}

/// Folds a lazy finite sequence of [`PartialResponse`] into one
/// [`MergedResponse`], with periodic progress telemetry, error recording,
/// and cancellation support. Driven by a single consumer task; the only
/// shared-mutation boundary is with the producer itself, guarded internally
/// by ordinary ownership (the accumulator lives on the consuming task).
pub struct Aggregator<'a> {
    accountant: &'a TokenAccountant,
    event_bus: Option<&'a dyn EventBus>,
    options: AggregatorOptions,
}

impl<'a> Aggregator<'a> {
    pub fn new(accountant: &'a TokenAccountant) -> Self {
        Self { accountant, event_bus: None, options: AggregatorOptions::default() }
    }

    pub fn with_event_bus(mut self, event_bus: &'a dyn EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Full aggregation, interpreting tool calls.
    pub async fn aggregate<S>(
        &self,
        stream: S,
        plan_id: &str,
        trace: &mut TraceRecord,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
        cancellation: Option<CancellationSignal>,
    ) -> Result<MergedResponse>
    where
        S: Stream<Item = Result<PartialResponse>> + Unpin,
    {
        self.run(stream, plan_id, trace, progress_tx, cancellation, false).await
    }

    /// Text-only aggregation: tool calls are never interpreted into the
    /// merged message, and early termination never fires regardless of
    /// `options`. Used by the memory compressor's summarization calls.
    pub async fn aggregate_text_only<S>(
        &self,
        stream: S,
        plan_id: &str,
        trace: &mut TraceRecord,
    ) -> Result<String>
    where
        S: Stream<Item = Result<PartialResponse>> + Unpin,
    {
        let merged = self.run(stream, plan_id, trace, None, None, true).await?;
        Ok(merged.message.text().to_string())
    }

    async fn run<S>(
        &self,
        mut stream: S,
        plan_id: &str,
        trace: &mut TraceRecord,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
        cancellation: Option<CancellationSignal>,
        text_only: bool,
    ) -> Result<MergedResponse>
    where
        S: Stream<Item = Result<PartialResponse>> + Unpin,
    {
        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut metadata: HashMap<String, Value> = HashMap::new();
        let mut usage = Usage::default();
        let mut id: Option<String> = None;
        let mut model: Option<String> = None;
        let mut prompt_metadata: Option<Value> = None;
        let mut rate_limit: Option<Value> = None;
        let mut partials_seen = 0usize;
        let mut early_terminated = false;

        let start = Instant::now();
        let mut last_progress = start;
        let mut cancellation = cancellation;

        loop {
            let next = if let Some(signal) = cancellation.as_mut() {
                tokio::select! {
                    biased;
                    changed = signal.0.changed() => {
                        if changed.is_ok() && *signal.0.borrow() {
                            early_terminated = true;
                            None
                        } else {
                            stream.next().await
                        }
                    }
                    item = stream.next() => item,
                }
            } else {
                stream.next().await
            };

            if early_terminated {
                break;
            }

            let Some(item) = next else { break };

            let partial = match item {
                Ok(partial) => partial,
                Err(err) => {
                    let message = err.to_string();
                    trace.record_error(RecordedError::Generic { message: message.clone() });
                    if let Some(bus) = self.event_bus {
                        bus.publish(PlanException { plan_id: plan_id.to_string(), cause: message.clone() });
                    }
                    return Err(CoreError::StreamProducer(message));
                }
            };

            partials_seen += 1;

            if let Some(delta) = partial.delta_text {
                text.push_str(&delta);
            }
            if !text_only {
                tool_calls.extend(partial.tool_calls);
            }
            if let Some(meta) = partial.generation_metadata {
                if !meta.is_null() {
                    if let Value::Object(obj) = meta {
                        for (k, v) in obj {
                            metadata.insert(k, v);
                        }
                    }
                }
            }
            if let Some(u) = partial.usage {
                usage.merge_from(&u);
            }
            if let Some(new_id) = partial.id.filter(|s| !s.is_empty()) {
                id = Some(new_id);
            }
            if let Some(new_model) = partial.model.filter(|s| !s.is_empty()) {
                model = Some(new_model);
            }
            if partial.rate_limit.is_some() && rate_limit.is_none() {
                rate_limit = partial.rate_limit;
            }
            if !metadata.is_empty() {
                prompt_metadata = Some(Value::Object(metadata.clone().into_iter().collect()));
            }

            let elapsed_since_progress = last_progress.elapsed();
            if elapsed_since_progress >= PROGRESS_INTERVAL {
                last_progress = Instant::now();
                let event = ProgressEvent {
                    elapsed: start.elapsed(),
                    partials_seen,
                    text_len: text.len(),
                    chars_per_sec: text.len() as f64 / start.elapsed().as_secs_f64().max(0.001),
                    tool_call_count: tool_calls.len(),
                    tool_call_descriptors: tool_calls.iter().map(ToolCall::compact_descriptor).collect(),
                    text_tail: tail(&text, TEXT_TAIL_CHARS),
                };
                tracing::info!(
                    target: "streaming_progress",
                    elapsed_ms = event.elapsed.as_millis() as u64,
                    partials_seen = event.partials_seen,
                    text_len = event.text_len,
                    "streaming progress"
                );
                if let Some(tx) = progress_tx.as_ref() {
                    let _ = tx.try_send(event);
                }
            }
        }

        let message = Message::Assistant {
            text: text.clone(),
            tool_calls: tool_calls.clone(),
            metadata,
        };
        let output_token_count = self.accountant.count_text(&text);
        trace.set_output_token_count(output_token_count);

        Ok(MergedResponse {
            message,
            usage,
            id,
            model,
            prompt_metadata,
            rate_limit,
            output_token_count,
            early_terminated,
        })
    }
}

fn tail(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        s.chars().skip(char_count - max_chars).collect()
    }
}

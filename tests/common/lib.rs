//! Test-only `ModelProvider` double. Mirrors the teacher's SSE-fixture test
//! helpers (`load_sse_fixture` in `codex-rs/core/tests/common/lib.rs`) but
//! without any HTTP/SSE machinery, since transport is out of this crate's
//! scope: a `FixtureModelProvider` simply replays a fixed, hand-authored
//! sequence of `PartialResponse` values.

use futures::stream;
use futures::stream::BoxStream;

use turnkeeper::error::CoreError;
use turnkeeper::error::Result;
use turnkeeper::message::Message;
use turnkeeper::model_provider::ModelProvider;
use turnkeeper::model_provider::Prompt;
use turnkeeper::stream_aggregator::PartialResponse;

/// Replays a fixed sequence of partials on every call to `stream()`,
/// optionally followed by a terminating producer error. Ignores the
/// `Prompt` it is given — tests assert on the messages passed in
/// separately, by inspecting the store or agent-message list before the
/// call, not by having the fixture echo them back.
pub struct FixtureModelProvider {
    partials: Vec<PartialResponse>,
    fail_with: Option<String>,
}

impl FixtureModelProvider {
    pub fn new(partials: Vec<PartialResponse>) -> Self {
        Self { partials, fail_with: None }
    }

    /// A fixture whose responses are one-line text deltas, convenient for
    /// building a `<state_snapshot>` summarization fixture.
    pub fn text(chunks: impl IntoIterator<Item = &'static str>) -> Self {
        Self::new(
            chunks
                .into_iter()
                .map(|chunk| PartialResponse {
                    delta_text: Some(chunk.to_string()),
                    ..Default::default()
                })
                .collect(),
        )
    }

    /// A fixture that emits a well-formed `<state_snapshot>` block,
    /// suitable for exercising a successful Memory Compressor summarization.
    pub fn state_snapshot() -> Self {
        Self::text([concat!(
            "<state_snapshot>",
            "<key_knowledge>user is migrating a billing service</key_knowledge>",
            "<previous_actions_summary>reviewed schema, drafted migration plan</previous_actions_summary>",
            "<recent_actions>ran migration dry run against staging</recent_actions>",
            "<current_plan>[DONE] draft plan\n[IN PROGRESS] dry run\n[PENDING] production cutover</current_plan>",
            "</state_snapshot>",
        )])
    }

    /// Replays `partials` and then fails with `message`, for exercising
    /// error-recording/propagation paths.
    pub fn failing(partials: Vec<PartialResponse>, message: impl Into<String>) -> Self {
        Self { partials, fail_with: Some(message.into()) }
    }
}

#[async_trait::async_trait]
impl ModelProvider for FixtureModelProvider {
    async fn stream(&self, _prompt: Prompt) -> BoxStream<'static, Result<PartialResponse>> {
        let mut items: Vec<Result<PartialResponse>> =
            self.partials.clone().into_iter().map(Ok).collect();
        if let Some(message) = self.fail_with.clone() {
            items.push(Err(CoreError::StreamProducer(message)));
        }
        Box::pin(stream::iter(items))
    }
}

/// Builds a `User -> Assistant -> ToolResponse` round with `text` repeated
/// across all three messages, used to build predictably-sized fixture
/// conversations for compaction tests.
pub fn full_round(text: &str) -> Vec<Message> {
    vec![
        Message::User { text: text.to_string(), metadata: Default::default() },
        Message::Assistant {
            text: text.to_string(),
            tool_calls: Vec::new(),
            metadata: Default::default(),
        },
        Message::ToolResponse { text: text.to_string(), metadata: Default::default() },
    ]
}

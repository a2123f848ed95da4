use futures::stream::BoxStream;

use crate::error::Result;
use crate::message::Message;
use crate::stream_aggregator::PartialResponse;

/// A prompt submitted to a model: the conversation so far plus an optional
/// system instruction. Deliberately minimal — anything transport-specific
/// (headers, auth, endpoint selection) lives outside this crate's scope.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub messages: Vec<Message>,
    pub instructions: Option<String>,
}

impl Prompt {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, instructions: None }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// The model, treated as an opaque producer of a finite, ordered sequence of
/// partial responses. No transport is mandated; this crate ships no
/// production implementation of this trait, only a fixture-replaying test
/// double under `tests/common`.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    async fn stream(&self, prompt: Prompt) -> BoxStream<'static, Result<PartialResponse>>;
}

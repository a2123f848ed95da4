use tiktoken_rs::CoreBPE;

use crate::message::Message;

/// Context and output token budgets for a single model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub context_limit: usize,
    pub output_limit: usize,
}

/// Built-in limit table, keyed by model family. Populated once at process
/// start and treated as immutable thereafter, matching the teacher's
/// `find_family_for_model` table of model families.
const MODEL_TABLE: &[(&str, ModelLimits)] = &[
    (
        "qwen3-coder-plus",
        ModelLimits { context_limit: 1_048_576, output_limit: 65_536 },
    ),
    (
        "qwen3-coder-flash",
        ModelLimits { context_limit: 1_048_576, output_limit: 65_536 },
    ),
    (
        "gemini-1.5-pro",
        ModelLimits { context_limit: 2_097_152, output_limit: 8_192 },
    ),
    (
        "gemini-1.5-flash",
        ModelLimits { context_limit: 1_048_576, output_limit: 8_192 },
    ),
    (
        "gpt-4o",
        ModelLimits { context_limit: 131_072, output_limit: 16_384 },
    ),
    (
        "gpt-4-turbo",
        ModelLimits { context_limit: 128_000, output_limit: 4_096 },
    ),
    (
        "gpt-4",
        ModelLimits { context_limit: 8_192, output_limit: 8_192 },
    ),
    (
        "gpt-3.5-turbo",
        ModelLimits { context_limit: 16_385, output_limit: 4_096 },
    ),
];

/// Counts tokens in text and structured messages using a cl100k_base BPE
/// encoder, with a deterministic fallback when the encoder is unavailable,
/// and serves per-model context/output limits. Re-entrant, `Send + Sync`;
/// intended to be constructed once and shared behind an `Arc`.
pub struct TokenAccountant {
    encoder: Option<CoreBPE>,
    default_context_limit: usize,
    default_output_limit: usize,
}

impl TokenAccountant {
    pub fn new(default_context_limit: usize, default_output_limit: usize) -> Self {
        let encoder = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(err) => {
                tracing::warn!("cl100k_base encoder unavailable, falling back to byte-length heuristic: {err}");
                None
            }
        };
        Self {
            encoder,
            default_context_limit,
            default_output_limit,
        }
    }

    /// Token count of a single string. Empty or whitespace-only text counts
    /// as zero regardless of encoder availability.
    pub fn count_text(&self, text: &str) -> usize {
        if text.trim().is_empty() {
            return 0;
        }
        match &self.encoder {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.len().div_ceil(4),
        }
    }

    /// Token count of an ordered message list, via canonical JSON
    /// serialization. Falls back to per-message text counts plus a
    /// structural overhead of four tokens per message if serialization
    /// fails.
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        match serde_json::to_string(messages) {
            Ok(json) => self.count_text(&json),
            Err(err) => {
                tracing::warn!("message list serialization failed, using per-message fallback: {err}");
                messages
                    .iter()
                    .map(|m| self.count_text(m.text()) + 4)
                    .sum()
            }
        }
    }

    /// Resolves context/output limits for a model name. Matching order:
    /// exact, case-insensitive exact, longest case-insensitive prefix match.
    /// Unknown, nil, or empty names fall back to the configured defaults.
    pub fn limit_for_model(&self, name: &str) -> ModelLimits {
        if name.is_empty() {
            return self.defaults();
        }
        if let Some((_, limits)) = MODEL_TABLE.iter().find(|(key, _)| *key == name) {
            return *limits;
        }
        let lower = name.to_lowercase();
        if let Some((_, limits)) = MODEL_TABLE.iter().find(|(key, _)| key.to_lowercase() == lower) {
            return *limits;
        }
        MODEL_TABLE
            .iter()
            .filter(|(key, _)| lower.starts_with(&key.to_lowercase()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, limits)| *limits)
            .unwrap_or_else(|| self.defaults())
    }

    fn defaults(&self) -> ModelLimits {
        ModelLimits {
            context_limit: self.default_context_limit,
            output_limit: self.default_output_limit,
        }
    }
}

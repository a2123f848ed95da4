use crate::dialog_round::DialogRound;
use crate::dialog_round::group_into_rounds;
use crate::error::CoreError;
use crate::error::Result;
use crate::message::Message;
use crate::model_provider::ModelProvider;
use crate::model_provider::Prompt;
use crate::stream_aggregator::Aggregator;
use crate::store::ConversationStore;
use crate::token_accountant::TokenAccountant;
use crate::trace_recorder::TraceRecord;

/// Fixed prompt instructing the model to emit a `<state_snapshot>` block.
/// Not configurable, matching the reference's single fixed summarization
/// prompt.
pub const SUMMARIZATION_PROMPT: &str = concat!(
    "The conversation so far is provided as JSON below. Summarize it into a ",
    "single `<state_snapshot>` XML block with exactly four non-empty ",
    "children: `<key_knowledge>`, `<previous_actions_summary>`, ",
    "`<recent_actions>`, and `<current_plan>`. Tag every item in ",
    "`<current_plan>` with one of `[DONE]`, `[IN PROGRESS]`, or `[PENDING]`. ",
    "Respond with only the `<state_snapshot>` block.",
);

const ACKNOWLEDGEMENT_PREFIX: &str =
    "The following is a summary that replaces an earlier, longer conversation history.\n\n";

/// Detects when a conversation exceeds a compression threshold, groups
/// messages into dialog rounds, summarizes older rounds via the model into
/// a structured snapshot, and rebuilds the store. Never produces a
/// partially rewritten conversation: failures during grouping, sizing,
/// serialization, or summarization leave the store untouched.
pub struct MemoryCompressor<'a> {
    accountant: &'a TokenAccountant,
    model: &'a dyn ModelProvider,
    compression_threshold: f64,
    retention_ratio: f64,
}

impl<'a> MemoryCompressor<'a> {
    pub fn new(
        accountant: &'a TokenAccountant,
        model: &'a dyn ModelProvider,
        compression_threshold: f64,
        retention_ratio: f64,
    ) -> Self {
        Self { accountant, model, compression_threshold, retention_ratio }
    }

    /// Compacts only if the conversation exceeds `compression_threshold *
    /// contextLimit`. A no-op otherwise. Any failure during compaction is
    /// logged and leaves the store untouched.
    pub async fn maybe_compact(&self, store: &dyn ConversationStore, cid: &str, model_name: &str) {
        let messages = store.get(cid);
        let total = self.accountant.count_messages(&messages);
        let limits = self.accountant.limit_for_model(model_name);
        let threshold = (self.compression_threshold * limits.context_limit as f64) as usize;
        if total <= threshold {
            return;
        }
        self.rewrite_store(store, cid, &messages).await;
    }

    /// Runs the compaction algorithm regardless of current size. Any
    /// failure is logged and leaves the store untouched.
    pub async fn force_compact(&self, store: &dyn ConversationStore, cid: &str, _model_name: &str) {
        let messages = store.get(cid);
        self.rewrite_store(store, cid, &messages).await;
    }

    /// If `storeMessages ⧺ agentMessages` exceeds the model's context limit,
    /// force-compacts the store, then force-compacts `agent_messages` and
    /// returns its compressed form; otherwise returns `agent_messages`
    /// unchanged. Summarization failures on the agent-message path
    /// propagate to the caller, unlike the store-mutating paths.
    pub async fn compact_if_combined_exceeds(
        &self,
        store: &dyn ConversationStore,
        cid: &str,
        model_name: &str,
        agent_messages: Vec<Message>,
    ) -> Result<Vec<Message>> {
        let mut combined = store.get(cid);
        combined.extend(agent_messages.clone());
        let total = self.accountant.count_messages(&combined);
        let limits = self.accountant.limit_for_model(model_name);
        if total <= limits.context_limit {
            return Ok(agent_messages);
        }

        self.force_compact(store, cid, model_name).await;

        self.build_compacted(&agent_messages, model_name)
            .await
            .map_err(|err| CoreError::SummarizationFailure(err.to_string()))
    }

    async fn rewrite_store(&self, store: &dyn ConversationStore, cid: &str, messages: &[Message]) {
        match self.build_compacted(messages, "").await {
            Ok(rebuilt) => store.replace(cid, rebuilt),
            Err(err) => {
                tracing::warn!("compaction failed for conversation {cid}, store left unchanged: {err}");
            }
        }
    }

    /// The core algorithm, shared by all three entry points: group into
    /// rounds, select what to retain, summarize the rest, and produce the
    /// rebuilt message list. Nothing here mutates a store; callers apply
    /// the result atomically via `ConversationStore::replace`.
    async fn build_compacted(&self, messages: &[Message], _model_name: &str) -> Result<Vec<Message>> {
        let rounds = group_into_rounds(messages);
        if rounds.is_empty() {
            return Ok(Vec::new());
        }

        let (kept, to_summarize) = select_retained(&rounds, self.accountant, self.retention_ratio);

        if to_summarize.is_empty() {
            // Always-one-round fallback: nothing older to summarize, so no
            // summary is inserted.
            return Ok(kept.into_iter().flat_map(|r| r.messages).collect());
        }

        let summary_text = self.summarize(&to_summarize).await?;

        let mut rebuilt = Vec::new();
        rebuilt.push(Message::compression_summary(format!(
            "{ACKNOWLEDGEMENT_PREFIX}{summary_text}"
        )));
        rebuilt.push(Message::compaction_acknowledgement());
        for round in kept {
            rebuilt.extend(round.messages);
        }
        Ok(rebuilt)
    }

    async fn summarize(&self, rounds: &[DialogRound]) -> Result<String> {
        let to_summarize: Vec<Message> = rounds.iter().flat_map(|r| r.messages.clone()).collect();
        let payload = serde_json::to_string(&to_summarize)?;
        let prompt = Prompt::new(vec![Message::User {
            text: payload,
            metadata: Default::default(),
        }])
        .with_instructions(SUMMARIZATION_PROMPT);

        let partial_stream = self.model.stream(prompt).await;
        let aggregator = Aggregator::new(self.accountant);
        let mut trace = TraceRecord::new();
        let text = aggregator
            .aggregate_text_only(partial_stream, "memory-compactor", &mut trace)
            .await
            .map_err(|err| CoreError::SummarizationFailure(err.to_string()))?;

        if text.trim().is_empty() || !text.contains("<state_snapshot>") {
            return Err(CoreError::SummarizationFailure(
                "model did not return a usable <state_snapshot> block".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Splits rounds into (kept, to_summarize) per the retention algorithm:
/// walk newest-to-oldest, greedily keeping a round if cumulative kept size
/// stays within `target = floor(retention_ratio * total)`. The newest round
/// is always kept. Kept rounds are always returned oldest-first regardless
/// of the order they were visited in.
pub fn select_retained(
    rounds: &[DialogRound],
    accountant: &TokenAccountant,
    retention_ratio: f64,
) -> (Vec<DialogRound>, Vec<DialogRound>) {
    let sizes: Vec<usize> = rounds
        .iter()
        .map(|r| {
            serde_json::to_string(&r.messages)
                .map(|json| accountant.count_text(&json))
                .unwrap_or(0)
        })
        .collect();
    let total: usize = sizes.iter().sum();
    let target = (retention_ratio * total as f64).floor() as usize;

    if total == 0 || target == 0 {
        return (rounds.to_vec(), Vec::new());
    }

    let mut kept_indices = Vec::new();
    let mut cumulative = 0usize;
    for idx in (0..rounds.len()).rev() {
        let size = sizes[idx];
        let is_newest = idx == rounds.len() - 1;
        if is_newest {
            kept_indices.push(idx);
            cumulative += size;
            continue;
        }
        if cumulative + size <= target {
            kept_indices.push(idx);
            cumulative += size;
        } else {
            break;
        }
    }

    kept_indices.sort_unstable();
    let kept: Vec<DialogRound> = kept_indices.iter().map(|&i| rounds[i].clone()).collect();
    let to_summarize: Vec<DialogRound> = rounds
        .iter()
        .enumerate()
        .filter(|(i, _)| !kept_indices.contains(i))
        .map(|(_, r)| r.clone())
        .collect();

    (kept, to_summarize)
}

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One turn's worth of content in a conversation. Immutable once appended to
/// a [`crate::store::ConversationStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        text: String,
        #[serde(default)]
        metadata: HashMap<String, Value>,
    },
    Assistant {
        text: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
        #[serde(default)]
        metadata: HashMap<String, Value>,
    },
    ToolResponse {
        text: String,
        #[serde(default)]
        metadata: HashMap<String, Value>,
    },
    System {
        text: String,
        #[serde(default)]
        metadata: HashMap<String, Value>,
    },
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::User { text, .. }
            | Message::Assistant { text, .. }
            | Message::ToolResponse { text, .. }
            | Message::System { text, .. } => text,
        }
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        match self {
            Message::User { metadata, .. }
            | Message::Assistant { metadata, .. }
            | Message::ToolResponse { metadata, .. }
            | Message::System { metadata, .. } => metadata,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }

    pub fn is_tool_response(&self) -> bool {
        matches!(self, Message::ToolResponse { .. })
    }

    /// Builds the summary user message inserted at index 0 after compaction.
    pub fn compression_summary(text: String) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("compression_summary".to_string(), Value::Bool(true));
        Message::User { text, metadata }
    }

    /// Fixed synthetic acknowledgement inserted at index 1 after compaction,
    /// required to preserve user/assistant alternation.
    pub fn compaction_acknowledgement() -> Self {
        Message::Assistant {
            text: "Got it. Thanks for the additional context!".to_string(),
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// A single tool invocation requested by the assistant, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text, not a parsed `Value` — callers parse it themselves if
    /// the shape is known ahead of time; this crate never interprets it.
    pub arguments: String,
}

impl ToolCall {
    /// The `[id]name(args)` descriptor used in progress telemetry.
    pub fn compact_descriptor(&self) -> String {
        format!("[{}]{}({})", self.id, self.name, self.arguments)
    }
}

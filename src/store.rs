use std::collections::HashMap;
use std::sync::Mutex;

use crate::message::Message;

/// Mapping from conversation id to an ordered message list. Insertion order
/// is preserved and is semantically significant; implementations may be
/// in-memory or persistent.
pub trait ConversationStore: Send + Sync {
    fn get(&self, cid: &str) -> Vec<Message>;
    fn append(&self, cid: &str, msg: Message);
    fn clear(&self, cid: &str);

    /// Replaces the entire conversation atomically: clears then appends each
    /// message in order. Used by the memory compressor's rebuild step so a
    /// partially-applied rewrite is never observable to a concurrent reader
    /// sharing the same lock discipline as `get`.
    fn replace(&self, cid: &str, messages: Vec<Message>) {
        self.clear(cid);
        for msg in messages {
            self.append(cid, msg);
        }
    }
}

/// The only store implementation this crate ships: conversations live for
/// the life of the process, per the explicit non-goal of persistence beyond
/// an in-memory key to message-list mapping.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get(&self, cid: &str) -> Vec<Message> {
        self.conversations
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(cid)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, cid: &str, msg: Message) {
        self.conversations
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .entry(cid.to_string())
            .or_default()
            .push(msg);
    }

    fn clear(&self, cid: &str) {
        self.conversations
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(cid);
    }
}

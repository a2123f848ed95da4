use crate::message::Message;

/// A contiguous group of messages representing one request/response cycle.
/// Derived and non-persisted; exists only for the duration of a compaction
/// call.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogRound {
    pub messages: Vec<Message>,
}

impl DialogRound {
    fn new(first: Message) -> Self {
        Self { messages: vec![first] }
    }

    fn has_user(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }
}

/// Groups an ordered message list into dialog rounds per the three
/// admissible shapes: `User -> Assistant -> ToolResponse`,
/// `User -> Assistant`, and `Assistant -> ToolResponse` (agent-internal
/// rounds with no user turn). Concatenating the messages of the returned
/// rounds, in order, reproduces `messages` exactly.
pub fn group_into_rounds(messages: &[Message]) -> Vec<DialogRound> {
    let mut rounds = Vec::new();
    let mut current: Option<DialogRound> = None;

    for msg in messages {
        match msg {
            Message::User { .. } => {
                if let Some(round) = current.take() {
                    rounds.push(round);
                }
                current = Some(DialogRound::new(msg.clone()));
            }
            Message::Assistant { .. } => {
                match current.take() {
                    Some(mut round) if round.has_user() => {
                        round.messages.push(msg.clone());
                        current = Some(round);
                    }
                    Some(round) => {
                        rounds.push(round);
                        current = Some(DialogRound::new(msg.clone()));
                    }
                    None => {
                        current = Some(DialogRound::new(msg.clone()));
                    }
                }
            }
            Message::ToolResponse { .. } => {
                let mut round = current.take().unwrap_or_else(|| DialogRound {
                    messages: Vec::new(),
                });
                round.messages.push(msg.clone());
                rounds.push(round);
                current = None;
            }
            Message::System { .. } => {
                if let Some(round) = current.as_mut() {
                    round.messages.push(msg.clone());
                }
                // No open round: a leading/standalone System message is
                // dropped, per the grouping rule for "any other kind".
            }
        }
    }

    if let Some(round) = current.take() {
        rounds.push(round);
    }

    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn user(text: &str) -> Message {
        Message::User { text: text.into(), metadata: HashMap::new() }
    }

    fn assistant(text: &str) -> Message {
        Message::Assistant { text: text.into(), tool_calls: vec![], metadata: HashMap::new() }
    }

    fn tool_response(text: &str) -> Message {
        Message::ToolResponse { text: text.into(), metadata: HashMap::new() }
    }

    #[test]
    fn groups_user_assistant_tool_response() {
        let messages = vec![user("hi"), assistant("hello"), tool_response("ok")];
        let rounds = group_into_rounds(&messages);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].messages, messages);
    }

    #[test]
    fn groups_user_assistant_without_tool_response() {
        let messages = vec![user("hi"), assistant("hello")];
        let rounds = group_into_rounds(&messages);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].messages, messages);
    }

    #[test]
    fn groups_agent_internal_assistant_tool_round() {
        let messages = vec![assistant("calling tool"), tool_response("result")];
        let rounds = group_into_rounds(&messages);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].messages, messages);
    }

    #[test]
    fn splits_on_consecutive_independent_rounds() {
        let messages = vec![
            user("first"),
            assistant("reply one"),
            tool_response("tool one"),
            user("second"),
            assistant("reply two"),
        ];
        let rounds = group_into_rounds(&messages);
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].messages.len(), 3);
        assert_eq!(rounds[1].messages.len(), 2);
    }

    #[test]
    fn grouping_is_lossless_round_trip() {
        let messages = vec![
            user("first"),
            assistant("reply"),
            tool_response("tool"),
            assistant("followup internal"),
            tool_response("internal result"),
            user("second"),
            assistant("reply two"),
        ];
        let rounds = group_into_rounds(&messages);
        let flattened: Vec<Message> = rounds.into_iter().flat_map(|r| r.messages).collect();
        assert_eq!(flattened, messages);
    }

    #[test]
    fn leading_system_message_with_no_open_round_is_dropped() {
        let messages = vec![
            Message::System { text: "sys".into(), metadata: HashMap::new() },
            user("hi"),
            assistant("hello"),
        ];
        let rounds = group_into_rounds(&messages);
        let flattened: Vec<Message> = rounds.into_iter().flat_map(|r| r.messages).collect();
        assert_eq!(flattened, vec![user("hi"), assistant("hello")]);
    }
}

//! Picks the bot's answer out of a multi-message reply.

use thiserror::Error;

use super::client::UpstreamReply;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no assistant answer among {messages} upstream messages")]
pub struct AnswerNotFound {
    pub messages: usize,
}

/// Content of the first `assistant`/`answer` message in wire order.
///
/// Only the first match is considered: if its content is empty the reply has
/// no usable answer, even when a later match carries text.
pub fn extract_answer(reply: &UpstreamReply) -> Result<&str, AnswerNotFound> {
    reply
        .messages
        .iter()
        .find(|m| m.role == "assistant" && m.kind == "answer")
        .map(|m| m.content.as_str())
        .filter(|content| !content.is_empty())
        .ok_or(AnswerNotFound { messages: reply.messages.len() })
}

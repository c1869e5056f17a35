//! Conversation-related types.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use gym_agent_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// The reason a message was refused by [`Conversation::push`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// System instructions are not part of the history, they are prepended
    /// to every model request instead.
    SystemMessage,
    /// A tool result that does not answer an open request of the preceding
    /// assistant message.
    UnexpectedToolResult(String),
    /// A message other than a tool result was pushed while the preceding
    /// assistant message still has unanswered tool calls.
    UnansweredToolCalls,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SystemMessage => {
                write!(f, "system messages cannot be stored in a conversation")
            }
            Error::UnexpectedToolResult(id) => {
                write!(f, "tool result `{id}` does not answer any open tool call")
            }
            Error::UnansweredToolCalls => {
                write!(f, "the latest tool calls have not been answered yet")
            }
        }
    }
}

impl StdError for Error {}

/// Represents the message history of a thread.
///
/// The history only grows. Every tool result answers exactly one tool call
/// of the assistant message right before it.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Appends a message to the conversation.
    pub fn push(&mut self, msg: ModelMessage) -> Result<(), Error> {
        match &msg {
            ModelMessage::System(_) => return Err(Error::SystemMessage),
            ModelMessage::Tool(result) => {
                if !self.open_tool_call_ids().any(|id| id == result.id) {
                    return Err(Error::UnexpectedToolResult(result.id.clone()));
                }
            }
            ModelMessage::User(_) | ModelMessage::Assistant(_) => {
                if self.open_tool_call_ids().next().is_some() {
                    return Err(Error::UnansweredToolCalls);
                }
            }
        }
        self.messages.push(msg);
        Ok(())
    }

    /// Returns all messages in order.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the latest message, if any.
    #[inline]
    pub fn latest(&self) -> Option<&ModelMessage> {
        self.messages.last()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the conversation has no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the text of the latest assistant message.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::Assistant(msg) => Some(msg.content.as_str()),
            _ => None,
        })
    }

    /// Ids of the tool calls of the trailing assistant message that have no
    /// result yet. A call id requested twice has to be answered twice.
    fn open_tool_call_ids(&self) -> impl Iterator<Item = &str> {
        let assistant_idx = self
            .messages
            .iter()
            .rposition(|msg| !matches!(msg, ModelMessage::Tool(_)));
        let (requests, answered): (&[_], &[_]) = match assistant_idx {
            Some(idx) => (
                self.messages[idx].tool_calls(),
                &self.messages[idx + 1..],
            ),
            None => (&[], &[]),
        };

        let mut answered: Vec<&str> = answered
            .iter()
            .filter_map(|msg| match msg {
                ModelMessage::Tool(result) => Some(result.id.as_str()),
                _ => None,
            })
            .collect();
        requests.iter().filter_map(move |req| {
            match answered.iter().position(|id| *id == req.id) {
                Some(pos) => {
                    answered.swap_remove(pos);
                    None
                }
                None => Some(req.id.as_str()),
            }
        })
    }
}

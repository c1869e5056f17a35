use std::error::Error as StdError;
use std::fmt::{self, Display};

use gym_agent_model::{ErrorKind as ModelErrorKind, ModelProviderError};

use crate::{checkpoint, conversation};

/// The kind of error that aborted a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The chat model could not be invoked, or its response broke off.
    ModelInvocation,
    /// The checkpoint store failed to load or save the conversation.
    Checkpoint,
    /// The model kept asking for tools beyond the configured bound.
    ToolRoundsExceeded,
    /// A message could not be appended to the conversation.
    InvalidConversation,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ModelInvocation => write!(f, "Model invocation failed"),
            ErrorKind::Checkpoint => write!(f, "Checkpoint failed"),
            ErrorKind::ToolRoundsExceeded => {
                write!(f, "Too many tool rounds")
            }
            ErrorKind::InvalidConversation => {
                write!(f, "Invalid conversation")
            }
        }
    }
}

/// An error that aborted a turn. The conversation keeps the messages that
/// were committed before the failure.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    model_error_kind: Option<ModelErrorKind>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn model_invocation(err: Box<dyn ModelProviderError>) -> Self {
        Self {
            kind: ErrorKind::ModelInvocation,
            model_error_kind: Some(err.kind()),
            source: Some(err),
        }
    }

    pub(crate) fn checkpoint(err: checkpoint::Error) -> Self {
        Self {
            kind: ErrorKind::Checkpoint,
            model_error_kind: None,
            source: Some(Box::new(err)),
        }
    }

    pub(crate) fn tool_rounds_exceeded() -> Self {
        Self {
            kind: ErrorKind::ToolRoundsExceeded,
            model_error_kind: None,
            source: None,
        }
    }

    pub(crate) fn invalid_conversation(err: conversation::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidConversation,
            model_error_kind: None,
            source: Some(Box::new(err)),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns what went wrong with the model, for
    /// [`ErrorKind::ModelInvocation`] errors.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ModelErrorKind> {
        self.model_error_kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// The agent configuration is not usable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// Two tools share the same name.
    DuplicateTool(String),
    /// The tool round bound must allow at least one round.
    ZeroToolRounds,
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateTool(name) => {
                write!(f, "tool `{name}` is registered more than once")
            }
            BuildError::ZeroToolRounds => {
                write!(f, "max tool rounds must be at least 1")
            }
        }
    }
}

impl StdError for BuildError {}

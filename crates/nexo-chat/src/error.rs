//! Error types for the conversational core.

use nexo_store::StoreError;
use std::fmt;

/// Coarse classification of a [`ChatError`], used by the formatter to decide
/// how much of a failure may be shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or ambiguous reference, malformed or oversized input.
    User,
    /// The language-understanding call failed.
    Classifier,
    /// The knowledge base rejected or failed a request.
    Store,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::User => write!(f, "user"),
            ErrorKind::Classifier => write!(f, "classifier"),
            ErrorKind::Store => write!(f, "store"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Errors from the chat engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    User(String),
    #[error("classifier error: {0}")]
    Classifier(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::User(_) => ErrorKind::User,
            ChatError::Classifier(_) => ErrorKind::Classifier,
            ChatError::Store(_) => ErrorKind::Store,
            ChatError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Classifier(err.to_string())
    }
}

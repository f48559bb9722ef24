//! Error types for knowledge-base access.

use nexo_core::error::NexoError;

/// Errors reported by a [`KnowledgeBase`](crate::KnowledgeBase) implementation.
///
/// Every variant carries plain strings so results can be cloned into the
/// chat layer's result envelopes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Longest error body kept from a failed response, in characters.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

impl StoreError {
    /// Map a non-success HTTP status and its body to an error.
    ///
    /// The body is cut to [`MAX_ERROR_BODY_CHARS`] since it ends up in
    /// user-facing diagnostics.
    pub fn from_status(status: u16, body: String) -> Self {
        let body = truncate_body(body);
        match status {
            404 => StoreError::NotFound(body),
            400 | 422 => StoreError::Validation(body),
            _ => StoreError::Status { status, body },
        }
    }
}

fn truncate_body(body: String) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if err.is_timeout() {
            StoreError::Network(format!("request timed out: {}", err))
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<NexoError> for StoreError {
    fn from(err: NexoError) -> Self {
        match err {
            NexoError::Validation(msg) => StoreError::Validation(msg),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

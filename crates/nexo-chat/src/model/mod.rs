//! Language-model backends used by the intent classifier.
//!
//! The classifier only needs "messages in, text out". [`PatternModel`] runs
//! offline on regex rules; [`OpenAiModel`] calls an OpenAI-compatible
//! chat-completions endpoint.

mod openai;
mod pattern;

pub use openai::OpenAiModel;
pub use pattern::PatternModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A text-completion backend.
///
/// Transport failures are reported as [`ChatError::Classifier`]. Whatever
/// text comes back is returned as-is; interpreting it is the caller's job.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, ChatError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

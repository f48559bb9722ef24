//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use nexo_core::config::ClassifierConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LanguageModel, Message};
use crate::error::ChatError;

/// Calls `POST {base_url}/chat/completions` with JSON output mode.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        })
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ChatError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ChatError::Classifier(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body<'a>(&'a self, messages: &'a [Message]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, ChatError> {
        tracing::debug!(model = %self.model, messages = messages.len(), "Calling chat completions");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Classifier(format!(
                "completion API error {}: {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Classifier("completion API returned no choices".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

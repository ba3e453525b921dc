//! Language-model client abstraction and the OpenAI-compatible adapter.
//!
//! The engine depends only on the [`LanguageModelClient`] trait so tests can
//! script completions without a network. The production adapter issues HTTP
//! requests against an OpenAI-compatible chat-completions endpoint with a
//! bounded timeout.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while requesting completions from the model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Backend could not be reached before the request timeout.
    #[error("Model backend unreachable: {0}")]
    Unreachable(String),
    /// Backend answered with a non-success status.
    #[error("Model backend returned {status}: {body}")]
    Backend {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend response could not be parsed.
    #[error("Malformed model response: {0}")]
    Malformed(String),
    /// Backend returned a response with no completion choices.
    #[error("Model returned no completion choices")]
    EmptyCompletion,
}

/// Interface implemented by chat-completion backends.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Produce a completion for the given system and user prompts.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelError>;
}

/// Chat client backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http: Client,
    endpoint: String,
    model: String,
}

impl OpenAiChatClient {
    /// Construct a client for the given endpoint and model.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let mut headers = header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth)
                .map_err(|err| ModelError::Malformed(format!("invalid API key: {err}")))?,
        );
        let http = Client::builder()
            .user_agent("docuchat/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ModelError::Unreachable(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl LanguageModelClient for OpenAiChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ModelError::Unreachable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Backend { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| ModelError::Malformed(err.to_string()))?;

        let choice = parsed.choices.into_iter().next();
        match choice {
            Some(choice) => Ok(choice.message.content.trim().to_string()),
            None => Err(ModelError::EmptyCompletion),
        }
    }
}

//! Chat Provider
//!
//! The language-model capability behind thought generation. Modeled as an
//! injectable trait so the tracker can run against deterministic stand-ins
//! in tests; `OpenAiChatProvider` is the production implementation for any
//! OpenAI-compatible chat completions endpoint (DeepSeek by default).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;

/// A prior conversation turn. The tracker always passes an empty slice
/// (every cycle is a single-shot, stateless call) but the capability
/// accepts history for other callers.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Provider reply for one completion
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub completion_text: String,
}

/// Language-model capability
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Single completion for `prompt`. `contexts`, `image_urls` and
    /// `tool_spec` exist for capability parity; the cycle engine passes
    /// them empty.
    async fn text_chat(
        &self,
        prompt: &str,
        contexts: &[ChatMessage],
        image_urls: &[String],
        tool_spec: Option<&Value>,
    ) -> Result<ChatResponse>;
}

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct OpenAiChatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiChatProvider {
    pub fn new(api_key: &str, base_url: &str, model: &str, max_tokens: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }

    /// Build from config; `None` when no API key is set.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.api_key.as_deref().map(|key| {
            Self::new(key, &config.api_base_url, &config.model_name, config.max_tokens)
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn text_chat(
        &self,
        prompt: &str,
        contexts: &[ChatMessage],
        _image_urls: &[String],
        _tool_spec: Option<&Value>,
    ) -> Result<ChatResponse> {
        let mut messages: Vec<ChatMessage> = contexts.to_vec();
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = CompletionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
        };

        debug!("Calling chat provider: model={}, prompt_len={}", self.model, prompt.len());

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("Provider API error {}: {}", status, text);
        }

        let result: CompletionResponse = response.json().await?;
        let completion_text = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Provider returned no choices"))?;

        info!("Provider response: model={}, len={}", self.model, completion_text.len());

        Ok(ChatResponse { completion_text })
    }
}

//! HTTP completion provider
//!
//! Implements [`CompletionProvider`] against an OpenAI-compatible text
//! completion endpoint (`POST {base_url}/completions`). This is the adapter
//! the platform ships with; hosts with their own provider plumbing implement
//! the trait directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::providers::{HttpCompletionProvider, CompletionOptions, CompletionProvider};
//!
//! async fn example() {
//!     let provider = HttpCompletionProvider::new("https://api.example.com/v1", "api-key");
//!     let completion = provider
//!         .complete("chat", "[user]\nHello!\n\n[assistant]\n", &CompletionOptions::new())
//!         .await
//!         .unwrap();
//!     println!("{}", completion.content);
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::providers::{Completion, CompletionOptions, CompletionProvider};
use crate::session::TokenUsage;

/// The default model requested when the host does not override it.
const DEFAULT_MODEL: &str = "cpm-large";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    /// Routing tag forwarded for model selection and billing attribution
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize, Default)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI-compatible text-completion adapter.
pub struct HttpCompletionProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpCompletionProvider {
    /// Create a provider against the given base URL.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the model requested from the endpoint.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(
        &self,
        intent: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            intent: Some(intent),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let url = format!("{}/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "completion endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("completion response had no choices".into()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(Completion::text(
            &choice.text,
            TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            parsed.model.as_deref().unwrap_or(&self.model),
        ))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

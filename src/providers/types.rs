//! Provider types for Foreman
//!
//! The completion provider is a text-completion contract: an intent tag, a
//! rendered prompt, and sampling options in; text plus token accounting out.
//! No native function-calling is assumed; providers that do support it can
//! populate [`Completion::native_tool_calls`] and the structured extractor
//! will consume the list instead of pattern-matching the text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{TokenUsage, ToolCall};

/// Options for a single completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    /// Create new default completion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    ///
    /// # Example
    /// ```
    /// use foreman::providers::CompletionOptions;
    ///
    /// let options = CompletionOptions::new().with_max_tokens(1024);
    /// assert_eq!(options.max_tokens, Some(1024));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw result of one completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Text content of the response
    pub content: String,
    /// Token accounting for this call
    pub tokens: TokenUsage,
    /// Model that served the request
    pub model: String,
    /// Tool calls parsed natively by the provider, when it supports
    /// structured tool-calling. Text-only providers leave this `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_tool_calls: Option<Vec<ToolCall>>,
}

impl Completion {
    /// Create a plain text completion.
    ///
    /// # Example
    /// ```
    /// use foreman::providers::Completion;
    /// use foreman::session::TokenUsage;
    ///
    /// let completion = Completion::text("Done.", TokenUsage::new(10, 2), "cpm-large");
    /// assert_eq!(completion.content, "Done.");
    /// assert!(completion.native_tool_calls.is_none());
    /// ```
    pub fn text(content: &str, tokens: TokenUsage, model: &str) -> Self {
        Self {
            content: content.to_string(),
            tokens,
            model: model.to_string(),
            native_tool_calls: None,
        }
    }

    /// Attach provider-native tool calls.
    pub fn with_native_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.native_tool_calls = Some(calls);
        self
    }
}

/// Trait for LLM completion providers.
///
/// `intent` is a short routing tag ("chat" for interactive turns) that
/// providers may use for model selection or billing attribution; plain
/// adapters can ignore it.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one completion request.
    async fn complete(
        &self,
        intent: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion>;

    /// Whether this provider returns structured tool calls natively.
    ///
    /// Drives extractor selection: `false` means the completion client
    /// pattern-matches the tool-call envelope out of free text.
    fn supports_native_tool_calls(&self) -> bool {
        false
    }

    /// The provider name (e.g. "openai-compatible").
    fn name(&self) -> &str;
}

//! Completion client
//!
//! Wraps a [`CompletionProvider`] with everything the orchestration loop
//! needs per LLM round-trip: the fail-fast configuration guard, transcript
//! rendering, the tool-catalog instruction block, and tool-call extraction.
//! The extractor variant is selected from provider capability at
//! construction time.

use std::sync::Arc;

use tracing::debug;

use crate::config::FeatureSet;
use crate::error::{AgentError, Result};
use crate::providers::{
    Completion, CompletionOptions, CompletionProvider, EnvelopeExtractor, StructuredExtractor,
    ToolCallExtractor,
};
use crate::session::{Message, Role, TokenUsage, ToolCall};
use crate::tools::ToolDefinition;

/// One LLM round-trip, post-extraction.
///
/// Either `content` is the final answer for the turn and `tool_calls` is
/// empty, or `content` is empty and `tool_calls` holds the requested calls.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    /// Final-answer text (empty when tools were requested)
    pub content: String,
    /// Requested tool calls, in provider order
    pub tool_calls: Vec<ToolCall>,
    /// Token accounting for this call
    pub tokens: TokenUsage,
    /// Model that served the request
    pub model: String,
}

impl LlmTurn {
    /// Whether this turn requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Client tying provider, transcript rendering, and extraction together.
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    extractor: Box<dyn ToolCallExtractor>,
}

impl CompletionClient {
    /// Create a client, selecting the extractor from provider capability.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        let extractor: Box<dyn ToolCallExtractor> = if provider.supports_native_tool_calls() {
            Box::new(StructuredExtractor)
        } else {
            Box::new(EnvelopeExtractor)
        };
        Self {
            provider,
            extractor,
        }
    }

    /// Perform one LLM round-trip for an interactive turn.
    ///
    /// Fails fast with a configuration error before any network call when
    /// the tenant has every AI feature disabled.
    pub async fn complete_turn(
        &self,
        messages: &[Message],
        catalog: &[ToolDefinition],
        options: &CompletionOptions,
        features: &FeatureSet,
    ) -> Result<LlmTurn> {
        if !features.any_enabled() {
            return Err(AgentError::Config(
                "No AI features are enabled for this tenant".into(),
            ));
        }

        let prompt = render_prompt(messages, catalog);
        debug!(
            provider = self.provider.name(),
            prompt_len = prompt.len(),
            tools = catalog.len(),
            "Requesting completion"
        );

        let completion = self.provider.complete("chat", &prompt, options).await?;
        Ok(self.split(completion))
    }

    fn split(&self, completion: Completion) -> LlmTurn {
        let tokens = completion.tokens;
        let model = completion.model.clone();
        let (content, tool_calls) = self.extractor.extract(&completion);
        LlmTurn {
            content,
            tool_calls,
            tokens,
            model,
        }
    }
}

/// Render the assembled message list into the linear text prompt the
/// text-completion provider consumes.
fn render_prompt(messages: &[Message], catalog: &[ToolDefinition]) -> String {
    let mut out = String::new();
    for msg in messages {
        match msg.role {
            Role::System => {
                out.push_str("[system]\n");
                out.push_str(&msg.content);
            }
            Role::User => {
                out.push_str("[user]\n");
                out.push_str(&msg.content);
            }
            Role::Assistant => {
                out.push_str("[assistant]\n");
                out.push_str(&msg.content);
                // Re-render prior tool requests so the model sees its own
                // call history in the same envelope shape it must emit.
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        if !out.ends_with('\n') && !out.ends_with("[assistant]\n") {
                            out.push('\n');
                        }
                        out.push_str(&render_envelope(call));
                    }
                }
            }
            Role::Tool => {
                out.push_str(&format!(
                    "[tool:{}]\n",
                    msg.tool_call_id.as_deref().unwrap_or("unknown")
                ));
                out.push_str(&msg.content);
            }
        }
        out.push_str("\n\n");
    }

    if !catalog.is_empty() {
        out.push_str(&render_tool_instructions(catalog));
        out.push_str("\n\n");
    }

    out.push_str("[assistant]\n");
    out
}

fn render_envelope(call: &ToolCall) -> String {
    serde_json::json!({
        "tool_call": { "name": call.name, "arguments": call.arguments }
    })
    .to_string()
}

fn render_tool_instructions(catalog: &[ToolDefinition]) -> String {
    let mut out = String::from(
        "[system]\n## Available Tools\n\n\
         To use a tool, reply with a single JSON object and nothing else:\n\
         {\"tool_call\": {\"name\": \"<tool name>\", \"arguments\": {<parameters>}}}\n\
         Call at most one tool per reply. When no tool is needed, answer the user directly.\n",
    );
    for def in catalog {
        out.push_str(&format!(
            "\n- {}: {}\n  parameters: {}",
            def.name, def.description, def.parameters
        ));
    }
    out
}

//! Tool-call extraction
//!
//! The platform's completion provider has no native structured tool-calling,
//! so tool requests arrive embedded in free text as a JSON envelope:
//!
//! ```json
//! {"tool_call": {"name": "draft_rfi_response", "arguments": {"rfi_id": 42}}}
//! ```
//!
//! [`EnvelopeExtractor`] locates at most one such envelope with a narrow,
//! tolerant pattern: a regex finds the envelope start (including inside code
//! fences or surrounded by prose) and a streaming JSON parse consumes exactly
//! the balanced value, ignoring trailing text. Parse failure means the raw
//! text is the final answer for that LLM turn.
//!
//! [`StructuredExtractor`] is the adapter for providers that do return a
//! native tool-call list; the orchestration loop works off the extractor
//! output either way, so provider capability is a construction-time choice
//! rather than a hardcoded behavior.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::providers::Completion;
use crate::session::ToolCall;

/// Locates the start of a tool-call envelope. Matching is intentionally
/// narrow: the object must open with the `tool_call` key.
static ENVELOPE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"tool_call"\s*:"#).expect("envelope pattern is valid"));

#[derive(Debug, Deserialize)]
struct Envelope {
    tool_call: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Generate a turn-unique tool-call id.
fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Splits a completion into final-answer content and requested tool calls.
///
/// Exactly one of the two outputs is populated: a turn either requests
/// tools (content cleared) or answers in text (no calls).
pub trait ToolCallExtractor: Send + Sync {
    /// Extract tool calls from a completion.
    fn extract(&self, completion: &Completion) -> (String, Vec<ToolCall>);
}

/// Text-pattern extractor for providers without structured tool-calling.
///
/// At most one tool call is extracted per LLM turn; the first envelope in
/// the text wins.
///
/// # Example
/// ```
/// use foreman::providers::{Completion, EnvelopeExtractor, ToolCallExtractor};
/// use foreman::session::TokenUsage;
///
/// let completion = Completion::text(
///     r#"Let me check. {"tool_call": {"name": "permit_status", "arguments": {"permit_id": 7}}}"#,
///     TokenUsage::default(),
///     "cpm-large",
/// );
/// let (content, calls) = EnvelopeExtractor.extract(&completion);
/// assert!(content.is_empty());
/// assert_eq!(calls[0].name, "permit_status");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeExtractor;

impl EnvelopeExtractor {
    fn parse_envelope(content: &str) -> Option<ToolCall> {
        let start = ENVELOPE_START.find(content)?.start();
        // StreamDeserializer stops at the end of the balanced JSON value,
        // so trailing prose or a closing code fence does not break the parse.
        let mut stream =
            serde_json::Deserializer::from_str(&content[start..]).into_iter::<Envelope>();
        let envelope = stream.next()?.ok()?;
        let arguments = match envelope.tool_call.arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Some(ToolCall::new(
            &generate_call_id(),
            &envelope.tool_call.name,
            arguments,
        ))
    }
}

impl ToolCallExtractor for EnvelopeExtractor {
    fn extract(&self, completion: &Completion) -> (String, Vec<ToolCall>) {
        match Self::parse_envelope(&completion.content) {
            Some(call) => (String::new(), vec![call]),
            None => (completion.content.clone(), Vec::new()),
        }
    }
}

/// Extractor for providers that return a native tool-call list.
///
/// Calls missing an id get one generated, keeping the turn-unique-id
/// invariant regardless of provider behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl ToolCallExtractor for StructuredExtractor {
    fn extract(&self, completion: &Completion) -> (String, Vec<ToolCall>) {
        match completion.native_tool_calls.as_ref() {
            Some(calls) if !calls.is_empty() => {
                let calls = calls
                    .iter()
                    .map(|c| {
                        let id = if c.id.is_empty() {
                            generate_call_id()
                        } else {
                            c.id.clone()
                        };
                        ToolCall::new(&id, &c.name, c.arguments.clone())
                    })
                    .collect();
                (String::new(), calls)
            }
            _ => (completion.content.clone(), Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenUsage;
    use serde_json::json;

    fn text(content: &str) -> Completion {
        Completion::text(content, TokenUsage::default(), "cpm-large")
    }

    #[test]
    fn test_envelope_bare() {
        let completion =
            text(r#"{"tool_call": {"name": "permit_status", "arguments": {"permit_id": 7}}}"#);
        let (content, calls) = EnvelopeExtractor.extract(&completion);
        assert!(content.is_empty());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "permit_status");
        assert_eq!(calls[0].arguments, json!({"permit_id": 7}));
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_envelope_with_surrounding_prose() {
        let completion = text(
            "I'll look that up.\n```json\n{\"tool_call\": {\"name\": \"draft_rfi_response\", \"arguments\": {\"rfi_id\": 42}}}\n```\nOne moment.",
        );
        let (content, calls) = EnvelopeExtractor.extract(&completion);
        assert!(content.is_empty());
        assert_eq!(calls[0].name, "draft_rfi_response");
        assert_eq!(calls[0].arguments["rfi_id"], 42);
    }

    #[test]
    fn test_envelope_missing_arguments_defaults_to_empty_object() {
        let completion = text(r#"{"tool_call": {"name": "project_summary"}}"#);
        let (_, calls) = EnvelopeExtractor.extract(&completion);
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let completion = text("The permit expires on March 3rd.");
        let (content, calls) = EnvelopeExtractor.extract(&completion);
        assert_eq!(content, "The permit expires on March 3rd.");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_malformed_envelope_is_final_answer() {
        let completion = text(r#"{"tool_call": {"name": }"#);
        let (content, calls) = EnvelopeExtractor.extract(&completion);
        assert!(calls.is_empty());
        assert_eq!(content, completion.content);
    }

    #[test]
    fn test_only_first_envelope_extracted() {
        let completion = text(
            r#"{"tool_call": {"name": "first", "arguments": {}}} {"tool_call": {"name": "second", "arguments": {}}}"#,
        );
        let (_, calls) = EnvelopeExtractor.extract(&completion);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "first");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let completion = text(r#"{"tool_call": {"name": "t", "arguments": {}}}"#);
        let (_, a) = EnvelopeExtractor.extract(&completion);
        let (_, b) = EnvelopeExtractor.extract(&completion);
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn test_structured_extractor_uses_native_list() {
        let completion = text("ignored").with_native_tool_calls(vec![
            ToolCall::new("call_a", "first", json!({})),
            ToolCall::new("", "second", json!({"x": 1})),
        ]);
        let (content, calls) = StructuredExtractor.extract(&completion);
        assert!(content.is_empty());
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert!(calls[1].id.starts_with("call_"));
    }

    #[test]
    fn test_structured_extractor_without_calls_passes_text() {
        let completion = text("final answer");
        let (content, calls) = StructuredExtractor.extract(&completion);
        assert_eq!(content, "final answer");
        assert!(calls.is_empty());
    }
}

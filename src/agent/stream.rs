//! Streamed event protocol
//!
//! Progress events pushed to the caller during a turn, as a discriminated
//! union. Per tool invocation the order is always `tool_call_start` →
//! `tool_result` → `tool_call_end`; the final answer arrives as
//! `text_delta` followed by `message_complete`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::session::TokenUsage;

/// Identifier pair naming a tool call in start/end events.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolCallRef {
    /// The tool call id
    pub id: String,
    /// The requested tool name
    pub name: String,
}

/// Outcome payload for a `tool_result` event.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultChunk {
    /// The tool call this result answers
    pub tool_call_id: String,
    /// Structured output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Captured error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One streamed progress event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A tool execution is starting
    ToolCallStart {
        /// The call being started
        tool_call: ToolCallRef,
    },
    /// A tool execution finished (successfully or not)
    ToolResult {
        /// The call's outcome
        tool_result: ToolResultChunk,
    },
    /// A tool execution's bookkeeping is complete
    ToolCallEnd {
        /// The call that ended
        tool_call: ToolCallRef,
    },
    /// A chunk of the final answer text
    TextDelta {
        /// The text chunk
        content: String,
    },
    /// The final answer has been persisted
    MessageComplete {
        /// Store-assigned id of the final assistant message
        message_id: String,
        /// The turn's accumulated token usage
        tokens: TokenUsage,
    },
}

/// Callback sink for streamed events.
pub type StreamSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_tagging() {
        let event = StreamEvent::ToolCallStart {
            tool_call: ToolCallRef {
                id: "call_1".into(),
                name: "permit_status".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call_start");
        assert_eq!(json["tool_call"]["name"], "permit_status");
    }

    #[test]
    fn test_tool_result_event_skips_none() {
        let event = StreamEvent::ToolResult {
            tool_result: ToolResultChunk {
                tool_call_id: "call_1".into(),
                result: Some(json!({"status": "active"})),
                error: None,
            },
        };
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"type\":\"tool_result\""));
        assert!(!text.contains("error"));
    }

    #[test]
    fn test_message_complete_event() {
        let event = StreamEvent::MessageComplete {
            message_id: "m-1".into(),
            tokens: TokenUsage::new(100, 20),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_complete");
        assert_eq!(json["tokens"]["total"], 120);
    }
}

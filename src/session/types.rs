//! Conversation types for Foreman
//!
//! This module defines the persisted conversation shapes: messages, roles,
//! tool calls folded into assistant messages, and token accounting. The
//! message log is append-only and keyed by session id; rows are never
//! mutated after insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions (prompt-assembly only, never persisted)
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call requested by the assistant.
///
/// Ephemeral between completion parse and execution; persisted only folded
/// into the requesting assistant message's `tool_calls` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this call within the turn
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Untyped key/value arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use foreman::session::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "draft_rfi_response", json!({"rfi_id": 42}));
    /// assert_eq!(call.name, "draft_rfi_response");
    /// ```
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.arguments.clone())
    }
}

/// Token accounting for a completion call or an accumulated turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub input: u32,
    /// Tokens in the completion
    pub output: u32,
    /// Total tokens (input + output)
    pub total: u32,
}

impl TokenUsage {
    /// Create new usage accounting.
    ///
    /// # Example
    /// ```
    /// use foreman::session::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total, 150);
    /// ```
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }

    /// Accumulate another call's usage into this turn total.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total = self.input + self.output;
    }
}

/// A single persisted message in a conversation.
///
/// Invariant: every `Role::Tool` message references a `tool_call_id` that was
/// emitted in a preceding assistant message's `tool_calls` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier (None until inserted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the executed tool (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Input passed to the tool (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    /// Output returned by the tool on success (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<Value>,
    /// Error captured from the tool on failure (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_error: Option<String>,
    /// Set when execution was withheld pending user confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    /// Token accounting (final assistant messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    /// Model that produced this message (final assistant messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When this message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn base(role: Role, content: &str) -> Self {
        Self {
            id: None,
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            tool_input: None,
            tool_output: None,
            tool_error: None,
            requires_confirmation: None,
            tokens: None,
            model: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use foreman::session::{Message, Role};
    ///
    /// let msg = Message::user("What's the status of RFI 42?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self::base(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self::base(Role::Assistant, content)
    }

    /// Create a new system message (prompt assembly only).
    pub fn system(content: &str) -> Self {
        Self::base(Role::System, content)
    }

    /// Create an assistant message carrying tool calls.
    ///
    /// # Example
    /// ```
    /// use foreman::session::{Message, ToolCall};
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "permit_status", json!({}));
    /// let msg = Message::assistant_with_tools("", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::base(Role::Assistant, content);
        msg.tool_calls = Some(tool_calls);
        msg
    }

    /// Create a final assistant message with token and model accounting.
    pub fn assistant_final(content: &str, tokens: TokenUsage, model: &str) -> Self {
        let mut msg = Self::base(Role::Assistant, content);
        msg.tokens = Some(tokens);
        msg.model = Some(model.to_string());
        msg
    }

    /// Create a tool result message recording input, output, and error.
    ///
    /// `content` is what the next LLM turn sees; the structured fields are
    /// the audit record.
    pub fn tool_result(
        tool_call_id: &str,
        tool_name: &str,
        content: &str,
        input: Value,
        output: Option<Value>,
        error: Option<String>,
    ) -> Self {
        let mut msg = Self::base(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.to_string());
        msg.tool_name = Some(tool_name.to_string());
        msg.tool_input = Some(input);
        msg.tool_output = output;
        msg.tool_error = error;
        msg
    }

    /// Check if this message carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// A reference to a domain entity ("current entity" in the agent context).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    /// Entity type (e.g. "rfi", "document", "permit", "daily_log")
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Entity identifier
    pub id: String,
}

impl EntityRef {
    /// Create a new entity reference.
    pub fn new(entity_type: &str, id: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }
}

/// The session record handed to `process_message` by the host application.
///
/// Carries identity and per-session state; tenant policy comes from the
/// store-backed [`TenantAgentConfig`](crate::config::TenantAgentConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (message-log key)
    pub id: String,
    /// The user driving this session
    pub user_id: String,
    /// The tenant company
    pub company_id: String,
    /// Optional project scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Optional entity the user is currently looking at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_entity: Option<EntityRef>,
    /// Stored user preference bag
    #[serde(default)]
    pub preferences: std::collections::BTreeMap<String, Value>,
}

impl SessionRecord {
    /// Create a minimal session record.
    ///
    /// # Example
    /// ```
    /// use foreman::session::SessionRecord;
    ///
    /// let session = SessionRecord::new("sess-1", "user-1", "co-1");
    /// assert!(session.project_id.is_none());
    /// ```
    pub fn new(id: &str, user_id: &str, company_id: &str) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            project_id: None,
            current_entity: None,
            preferences: Default::default(),
        }
    }

    /// Scope the session to a project.
    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    /// Set the current entity reference.
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.current_entity = Some(entity);
        self
    }

    /// Set a user preference.
    pub fn with_preference(mut self, key: &str, value: Value) -> Self {
        self.preferences.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_calls.is_none());
        assert!(msg.id.is_none());
    }

    #[test]
    fn test_message_with_tool_calls() {
        let call = ToolCall::new("call_1", "permit_status", json!({"permit_id": 7}));
        let msg = Message::assistant_with_tools("", vec![call]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls.as_ref().unwrap()[0].name, "permit_status");
    }

    #[test]
    fn test_message_tool_result() {
        let msg = Message::tool_result(
            "call_1",
            "permit_status",
            r#"{"status":"active"}"#,
            json!({"permit_id": 7}),
            Some(json!({"status": "active"})),
            None,
        );
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.tool_name.as_deref(), Some("permit_status"));
        assert!(msg.tool_error.is_none());
    }

    #[test]
    fn test_message_assistant_final_accounting() {
        let msg = Message::assistant_final("done", TokenUsage::new(10, 5), "cpm-large");
        assert_eq!(msg.tokens.unwrap().total, 15);
        assert_eq!(msg.model.as_deref(), Some("cpm-large"));
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
        assert!(!json.contains("requires_confirmation"));
    }

    #[test]
    fn test_token_usage_add() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage::new(100, 20));
        total.add(&TokenUsage::new(50, 30));
        assert_eq!(total.input, 150);
        assert_eq!(total.output, 50);
        assert_eq!(total.total, 200);
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Deserialize)]
        struct Args {
            rfi_id: u32,
        }
        let call = ToolCall::new("call_1", "draft_rfi_response", json!({"rfi_id": 42}));
        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.rfi_id, 42);
    }

    #[test]
    fn test_entity_ref_serde_uses_type_key() {
        let entity = EntityRef::new("rfi", "42");
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"type\":\"rfi\""));
    }

    #[test]
    fn test_session_record_builders() {
        let session = SessionRecord::new("s1", "u1", "c1")
            .with_project("p1")
            .with_entity(EntityRef::new("rfi", "42"))
            .with_preference("auto_confirm_tools", json!(true));
        assert_eq!(session.project_id.as_deref(), Some("p1"));
        assert_eq!(session.current_entity.as_ref().unwrap().id, "42");
        assert_eq!(session.preferences["auto_confirm_tools"], json!(true));
    }
}

//! Tool types for Foreman
//!
//! This module defines the uniform contract every domain tool satisfies: the
//! `Tool` trait, the `ToolContext` handed to executions, and the result
//! shapes. The orchestrator never inspects a tool's internals; it resolves
//! by name, gates on policy, executes, and records the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{AgentContext, CancelSignal};
use crate::error::Result;

/// Catalog entry describing a tool to the LLM and to policy checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique within a registry)
    pub name: String,
    /// Human-readable description sent to the LLM
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
    /// Whether execution is gated behind user confirmation outside
    /// autonomous mode
    pub requires_confirmation: bool,
}

/// Result returned by a tool execution.
///
/// Tools must not raise for expected/business-logic failures; they return
/// `success: false` with an error message instead. Raised faults are treated
/// identically by the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Whether the tool accomplished its task
    pub success: bool,
    /// Structured output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ToolResult {
    /// Successful result with structured output.
    ///
    /// # Example
    /// ```
    /// use foreman::tools::ToolResult;
    /// use serde_json::json;
    ///
    /// let result = ToolResult::ok(json!({"status": "active"}));
    /// assert!(result.success);
    /// ```
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    /// Failed result with an error message.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_code: None,
        }
    }

    /// Failed result with an error message and machine-readable code.
    pub fn err_with_code(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_code: Some(code.into()),
        }
    }
}

/// Context provided to tools during execution.
///
/// Extends the turn's [`AgentContext`] with the cooperative cancellation
/// signal and the originating message id, when known.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The turn's agent context (identity, policy, current entity)
    pub agent: AgentContext,
    /// Cooperative cancellation signal; long-running tools may observe it
    pub cancel: Option<CancelSignal>,
    /// The user message that triggered this execution, when known
    pub message_id: Option<String>,
}

impl ToolContext {
    /// Build a tool context from the turn's agent context.
    pub fn new(agent: AgentContext) -> Self {
        let cancel = agent.cancel.clone();
        Self {
            agent,
            cancel,
            message_id: None,
        }
    }

    /// Attach the originating message id.
    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.message_id = Some(message_id.to_string());
        self
    }
}

/// Trait that all domain tools implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use foreman::tools::{Tool, ToolContext, ToolResult};
/// use foreman::error::Result;
///
/// struct PermitStatusTool;
///
/// #[async_trait]
/// impl Tool for PermitStatusTool {
///     fn name(&self) -> &str { "permit_status" }
///     fn description(&self) -> &str { "Look up a permit's current status" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": { "permit_id": { "type": "integer" } },
///             "required": ["permit_id"]
///         })
///     }
///     async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolResult> {
///         Ok(ToolResult::ok(serde_json::json!({"status": "active"})))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool name the LLM requests it by. Unique within a registry.
    fn name(&self) -> &str;

    /// Description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn parameters(&self) -> Value;

    /// Whether execution requires user confirmation outside autonomous mode.
    ///
    /// Destructive or consequential tools override this to `true`; the
    /// executor then refuses silent execution in advisory mode.
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Feature flag gating this tool's availability, if any.
    ///
    /// Tools tied to a tenant feature return its key here; the registry
    /// omits them from the catalog when the feature is disabled.
    fn feature(&self) -> Option<&str> {
        None
    }

    /// Entity types this tool applies to. Empty means any context; a
    /// non-empty list restricts the tool to turns whose current entity
    /// matches one of the types.
    fn entity_kinds(&self) -> &[&str] {
        &[]
    }

    /// Execute the tool.
    ///
    /// # Arguments
    /// * `input` - Untyped key/value arguments from the tool call
    /// * `ctx` - Execution context (identity, policy, cancellation)
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Accounting record for one attempted tool call.
///
/// Exactly one of these exists per attempt, whatever happened: unknown tool,
/// confirmation refusal, execution error, or success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The tool call id this result answers
    pub id: String,
    /// Requested tool name
    pub name: String,
    /// Arguments the call carried
    pub arguments: Value,
    /// Structured output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Captured error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time (zero when execution was skipped)
    pub execution_time_ms: u64,
}

impl ToolCallResult {
    /// Whether the attempt succeeded.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// One-line outcome for the budget-exhaustion summary.
    pub fn outcome_label(&self) -> &str {
        self.error.as_deref().unwrap_or("Completed")
    }
}

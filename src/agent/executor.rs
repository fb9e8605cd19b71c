//! Tool executor
//!
//! Runs one parsed tool call end to end: registry resolution, the
//! confirmation gate, timed execution with error capture, persistence of
//! the `tool` message, and the three ordered stream events. Every step is
//! fault-isolated: one tool's failure is folded into its result and never
//! aborts the loop. The only errors that escape are persistence failures,
//! which must fail the turn because losing the record of what ran breaks
//! auditability.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::agent::{AgentContext, StreamEvent, ToolCallRef, ToolResultChunk};
use crate::config::AutonomyLevel;
use crate::error::Result;
use crate::session::{HistoryStore, Message, ToolCall};
use crate::tools::{ToolCallResult, ToolContext, ToolRegistry};

/// Outcome of one attempted tool call.
pub struct ExecutionOutcome {
    /// The accounting record for the turn's result accumulator
    pub result: ToolCallResult,
    /// The persisted `tool` message, appended to the in-flight sequence
    pub message: Message,
}

/// Executes parsed tool calls against the registry with policy gating.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    store: Arc<dyn HistoryStore>,
}

impl ToolExecutor {
    /// Create an executor over the given registry and store.
    pub fn new(registry: Arc<ToolRegistry>, store: Arc<dyn HistoryStore>) -> Self {
        Self { registry, store }
    }

    /// Run one tool call.
    ///
    /// Emits `tool_call_start`, `tool_result`, `tool_call_end` in that
    /// order through `emit`, persists the `tool` message, and returns the
    /// result record plus the message to append to the prompt sequence.
    ///
    /// # Errors
    /// Only persistence failures propagate; resolution, policy, and
    /// execution failures are captured in the returned result.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &AgentContext,
        emit: &(dyn Fn(StreamEvent) + Send + Sync),
    ) -> Result<ExecutionOutcome> {
        emit(StreamEvent::ToolCallStart {
            tool_call: ToolCallRef {
                id: call.id.clone(),
                name: call.name.clone(),
            },
        });

        let (output, error, execution_time_ms, gated) = self.run(call, ctx).await;

        let result = ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            output: output.clone(),
            error: error.clone(),
            execution_time_ms,
        };

        // What the next LLM turn sees: the output on success, an error
        // object otherwise.
        let content = match (&output, &error) {
            (Some(output), None) => output.to_string(),
            (_, Some(err)) => json!({ "error": err }).to_string(),
            (None, None) => Value::Null.to_string(),
        };

        let mut message = Message::tool_result(
            &call.id,
            &call.name,
            &content,
            call.arguments.clone(),
            output,
            error.clone(),
        );
        if gated {
            message.requires_confirmation = Some(true);
        }

        let message = match self.store.insert_message(&ctx.session_id, message).await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(tool = %call.name, error = %e, "Failed to persist tool message");
                return Err(e);
            }
        };

        emit(StreamEvent::ToolResult {
            tool_result: ToolResultChunk {
                tool_call_id: call.id.clone(),
                result: result.output.clone(),
                error: result.error.clone(),
            },
        });
        emit(StreamEvent::ToolCallEnd {
            tool_call: ToolCallRef {
                id: call.id.clone(),
                name: call.name.clone(),
            },
        });

        Ok(ExecutionOutcome { result, message })
    }

    /// Resolve, gate, and run the tool. Returns (output, error, ms, gated).
    async fn run(
        &self,
        call: &ToolCall,
        ctx: &AgentContext,
    ) -> (Option<Value>, Option<String>, u64, bool) {
        let tool = match self.registry.get(&call.name) {
            Some(tool) => tool,
            None => {
                info!(tool = %call.name, "Tool not found");
                return (None, Some(format!("Tool not found: {}", call.name)), 0, false);
            }
        };

        // Safety boundary: consequential tools never execute silently in
        // advisory mode.
        if tool.requires_confirmation()
            && ctx.autonomy != AutonomyLevel::Autonomous
            && !ctx.auto_confirm_tools()
        {
            info!(tool = %call.name, autonomy = %ctx.autonomy, "Tool requires user confirmation");
            return (
                None,
                Some(format!("Tool '{}' requires user confirmation", call.name)),
                0,
                true,
            );
        }

        let tool_ctx = ToolContext::new(ctx.clone());
        let start = Instant::now();
        let (output, error) = match tool.execute(call.arguments.clone(), &tool_ctx).await {
            Ok(result) if result.success => (result.data, None),
            Ok(result) => (
                None,
                Some(result.error.unwrap_or_else(|| "Tool failed".to_string())),
            ),
            Err(e) => (None, Some(e.to_string())),
        };
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match &error {
            None => debug!(tool = %call.name, latency_ms = execution_time_ms, "Tool executed"),
            Some(err) => {
                error!(tool = %call.name, latency_ms = execution_time_ms, error = %err, "Tool execution failed")
            }
        }

        (output, error, execution_time_ms, false)
    }
}

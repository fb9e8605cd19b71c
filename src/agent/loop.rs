//! Orchestration loop
//!
//! [`Agent`] is the crate's entry point. `process_message` drives the
//! bounded tool-calling loop: persist the user message, build the turn
//! context, then alternate LLM round-trips and tool executions until the
//! model answers in plain text or the iteration budget runs out. Budget
//! exhaustion degrades to an enumerated summary of what ran; it is never a
//! hard failure. `execute_task` runs a single tool for the background task
//! worker, and `handle_event` forwards domain events to the bridge.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::{
    AgentContext, CancelSignal, ContextBuilder, PromptAssembler, StreamEvent, ToolExecutor,
};
use crate::config::{AutonomyLevel, RunOptions};
use crate::error::{AgentError, Result};
use crate::events::{AgentEvent, EventBridge, TaskRecord};
use crate::providers::{CompletionClient, CompletionOptions, CompletionProvider};
use crate::session::{HistoryStore, Message, SessionRecord, TokenUsage};
use crate::tools::{ToolCallResult, ToolContext, ToolRegistry, ToolResult};

/// Number of stored messages included in each prompt.
const HISTORY_WINDOW: usize = 20;

/// Where the turn's control flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    /// Waiting on the next LLM round-trip
    Running,
    /// Tools executed this iteration; the next round-trip may be the final answer
    AwaitingFinal,
    /// Iteration budget spent; degrading to the summary
    Exhausted,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::Running => write!(f, "running"),
            TurnState::AwaitingFinal => write!(f, "awaiting_final"),
            TurnState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Per-call options for [`Agent::process_message`].
#[derive(Clone, Default)]
pub struct ProcessOptions {
    /// Run configuration (budget, sampling, streaming)
    pub config: RunOptions,
    /// Sink for streamed progress events
    pub on_stream: Option<crate::agent::StreamSink>,
    /// Cooperative cancellation signal
    pub cancel: Option<CancelSignal>,
}

impl ProcessOptions {
    /// Override the run configuration.
    pub fn with_config(mut self, config: RunOptions) -> Self {
        self.config = config;
        self
    }

    /// Attach a stream sink.
    pub fn with_stream(mut self, sink: crate::agent::StreamSink) -> Self {
        self.on_stream = Some(sink);
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A follow-up the UI can offer after a completed turn.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SuggestedAction {
    /// Short button label
    pub label: String,
    /// The user message the action sends when chosen
    pub prompt: String,
}

impl SuggestedAction {
    fn new(label: &str, prompt: &str) -> Self {
        Self {
            label: label.to_string(),
            prompt: prompt.to_string(),
        }
    }
}

/// The completed turn returned by [`Agent::process_message`].
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    /// Final assistant text
    pub content: String,
    /// Results of every tool call attempted this turn, in execution order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResult>>,
    /// Up to three follow-up suggestions
    pub suggested_actions: Vec<SuggestedAction>,
    /// Accumulated token usage across every LLM call this turn
    pub tokens: TokenUsage,
    /// Model that served the turn
    pub model: String,
    /// Wall-clock duration of the turn
    pub latency_ms: u64,
}

/// The orchestrator.
///
/// Owns the store, the completion client, the tool registry, and the prompt
/// assembler; one instance serves concurrent sessions because every turn
/// builds its own immutable context.
///
/// # Example
///
/// ```rust,ignore
/// let agent = Agent::new(store, provider, registry);
/// let response = agent
///     .process_message(&session, "What's open on RFI 42?", ProcessOptions::default())
///     .await?;
/// println!("{}", response.content);
/// ```
pub struct Agent {
    store: Arc<dyn HistoryStore>,
    client: CompletionClient,
    registry: Arc<ToolRegistry>,
    assembler: PromptAssembler,
    executor: ToolExecutor,
    bridge: Option<EventBridge>,
}

impl Agent {
    /// Create an agent over a store, a completion provider, and a registry.
    pub fn new(
        store: Arc<dyn HistoryStore>,
        provider: Arc<dyn CompletionProvider>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let executor = ToolExecutor::new(registry.clone(), store.clone());
        Self {
            store,
            client: CompletionClient::new(provider),
            registry,
            assembler: PromptAssembler::new(),
            executor,
            bridge: None,
        }
    }

    /// Override the prompt assembler (role prompt).
    pub fn with_prompt_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Attach an event bridge for [`Agent::handle_event`].
    pub fn with_event_bridge(mut self, bridge: EventBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Process one user message through the bounded tool-calling loop.
    ///
    /// Persists the user message, then alternates LLM round-trips and tool
    /// executions until the model produces a plain-text answer or the
    /// iteration budget is spent. Tool failures are folded into the
    /// conversation; only configuration, persistence, and cancellation
    /// errors surface as `Err`.
    ///
    /// # Arguments
    /// * `session` - The host application's session record
    /// * `content` - The user's message text
    /// * `opts` - Per-call configuration, stream sink, and cancellation
    pub async fn process_message(
        &self,
        session: &SessionRecord,
        content: &str,
        opts: ProcessOptions,
    ) -> Result<AgentResponse> {
        let started = Instant::now();

        let user_message = self
            .store
            .insert_message(&session.id, Message::user(content))
            .await?;

        let ctx = ContextBuilder::build(
            self.store.as_ref(),
            session,
            opts.cancel.clone(),
            user_message.id.clone(),
        )
        .await;

        if !ctx.enabled {
            return Err(AgentError::Config(
                "AI assistant is disabled for this tenant".into(),
            ));
        }

        let emit = |event: StreamEvent| {
            if opts.config.stream_responses {
                if let Some(sink) = &opts.on_stream {
                    sink(event);
                }
            }
        };

        let catalog = self.registry.available_for(&ctx);
        let completion_options = CompletionOptions::new()
            .with_max_tokens(opts.config.max_tokens)
            .with_temperature(opts.config.temperature);

        let history = self.store.list_messages(&session.id, HISTORY_WINDOW).await?;
        let mut sequence = self.assembler.assemble(&ctx, &history);

        let budget = opts.config.max_tool_calls as usize;
        let mut results: Vec<ToolCallResult> = Vec::new();
        let mut tokens = TokenUsage::default();
        let mut model = String::new();
        let mut state = TurnState::Running;

        let (content, message_id) = loop {
            if ctx.cancelled() {
                info!(session_id = %ctx.session_id, "Turn aborted by caller");
                return Err(AgentError::Aborted("Request aborted".into()));
            }

            let turn = self
                .client
                .complete_turn(&sequence, &catalog, &completion_options, &ctx.features)
                .await?;
            tokens.add(&turn.tokens);
            model = turn.model.clone();

            if !turn.has_tool_calls() {
                let message = self
                    .store
                    .insert_message(
                        &session.id,
                        Message::assistant_final(&turn.content, tokens, &model),
                    )
                    .await?;
                break (turn.content, message.id.unwrap_or_default());
            }

            // Budget check before execution: the call that would exceed the
            // limit is never run.
            if results.len() >= budget {
                state = TurnState::Exhausted;
                let summary = exhaustion_summary(&results);
                let message = self
                    .store
                    .insert_message(
                        &session.id,
                        Message::assistant_final(&summary, tokens, &model),
                    )
                    .await?;
                warn!(
                    session_id = %ctx.session_id,
                    tool_calls = results.len(),
                    "Tool budget exhausted, degrading to summary"
                );
                break (summary, message.id.unwrap_or_default());
            }

            let request = self
                .store
                .insert_message(
                    &session.id,
                    Message::assistant_with_tools(&turn.content, turn.tool_calls.clone()),
                )
                .await?;
            sequence.push(request);

            for call in &turn.tool_calls {
                if results.len() >= budget {
                    break;
                }
                let outcome = self.executor.execute(call, &ctx, &emit).await?;
                results.push(outcome.result);
                sequence.push(outcome.message);
            }
            state = TurnState::AwaitingFinal;
        };

        if let Err(e) = self.store.update_session_metrics(&session.id, &tokens).await {
            warn!(session_id = %ctx.session_id, error = %e, "Failed to update session metrics");
        }

        emit(StreamEvent::TextDelta {
            content: content.clone(),
        });
        emit(StreamEvent::MessageComplete {
            message_id: message_id.clone(),
            tokens,
        });

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id = %ctx.session_id,
            latency_ms,
            tokens = tokens.total,
            tool_calls = results.len(),
            state = %state,
            "Turn complete"
        );

        Ok(AgentResponse {
            content,
            tool_calls: if results.is_empty() {
                None
            } else {
                Some(results)
            },
            suggested_actions: suggested_actions(&ctx),
            tokens,
            model,
            latency_ms,
        })
    }

    /// Run a single tool for the background task worker.
    ///
    /// The task type is resolved as a tool name in the registry; an unknown
    /// type is a `NotFound` error. The confirmation gate applies exactly as
    /// in interactive execution, with a policy refusal returned as an
    /// error-shaped [`ToolResult`] rather than `Err`.
    pub async fn execute_task(
        &self,
        task_type: &str,
        input: Value,
        ctx: &AgentContext,
    ) -> Result<ToolResult> {
        let tool = self
            .registry
            .get(task_type)
            .ok_or_else(|| AgentError::NotFound(format!("Tool not found: {}", task_type)))?;

        if tool.requires_confirmation()
            && ctx.autonomy != AutonomyLevel::Autonomous
            && !ctx.auto_confirm_tools()
        {
            info!(tool = %task_type, "Background task requires user confirmation");
            return Ok(ToolResult::err(format!(
                "Tool '{}' requires user confirmation",
                task_type
            )));
        }

        let started = Instant::now();
        // Raised faults are captured like returned errors, matching the
        // interactive executor.
        let result = match tool.execute(input, &ToolContext::new(ctx.clone())).await {
            Ok(result) => result,
            Err(e) => ToolResult::err(e.to_string()),
        };
        info!(
            tool = %task_type,
            latency_ms = started.elapsed().as_millis() as u64,
            success = result.success,
            "Background task executed"
        );
        Ok(result)
    }

    /// Forward a domain event to the configured event bridge.
    ///
    /// # Errors
    /// Returns a configuration error when no bridge was attached.
    pub async fn handle_event(&self, event: &AgentEvent) -> Result<Option<TaskRecord>> {
        match &self.bridge {
            Some(bridge) => bridge.handle_event(event).await,
            None => Err(AgentError::Config("No event bridge configured".into())),
        }
    }
}

/// Render the budget-exhaustion summary: fixed preamble plus one line per
/// attempted call.
fn exhaustion_summary(results: &[ToolCallResult]) -> String {
    let mut out =
        String::from("I reached the tool call limit for this request. Here is what I completed:\n");
    for result in results {
        out.push_str(&format!("- {}: {}\n", result.name, result.outcome_label()));
    }
    out
}

/// Compute up to three follow-up suggestions from the turn context.
fn suggested_actions(ctx: &AgentContext) -> Vec<SuggestedAction> {
    let mut actions = Vec::new();

    if let Some(entity) = &ctx.current_entity {
        match entity.entity_type.as_str() {
            "rfi" if ctx.features.is_enabled("rfi_drafting") => {
                actions.push(SuggestedAction::new(
                    "Draft a response",
                    "Draft a response to this RFI",
                ));
            }
            "document" if ctx.features.is_enabled("document_processing") => {
                actions.push(SuggestedAction::new(
                    "Classify this document",
                    "Classify this document and extract its key fields",
                ));
            }
            "permit" if ctx.features.is_enabled("permit_tracking") => {
                actions.push(SuggestedAction::new(
                    "Check expiry",
                    "When does this permit expire and what should we do about it?",
                ));
            }
            "daily_log" if ctx.features.is_enabled("daily_log_parsing") => {
                actions.push(SuggestedAction::new(
                    "Extract structured data",
                    "Extract the structured data from this daily log",
                ));
            }
            _ => {}
        }
    }

    if ctx.project_id.is_some() {
        actions.push(SuggestedAction::new(
            "Project summary",
            "Give me a summary of this project",
        ));
        actions.push(SuggestedAction::new(
            "Open items",
            "What items on this project need attention?",
        ));
    }

    actions.truncate(3);
    actions
}

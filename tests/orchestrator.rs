//! End-to-end orchestration scenarios against the public API, with a
//! scripted provider and the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use foreman::agent::{Agent, CancelSignal, ProcessOptions, StreamEvent};
use foreman::config::{AutonomyLevel, RunOptions, TenantAgentConfig};
use foreman::error::Result;
use foreman::providers::{Completion, CompletionOptions, CompletionProvider};
use foreman::session::{
    HistoryStore, MemoryHistoryStore, Role, SessionRecord, TokenUsage,
};
use foreman::tools::{Tool, ToolContext, ToolRegistry, ToolResult};
use foreman::AgentError;

/// Replays a fixed list of completions and counts how often it was called.
struct ScriptedProvider {
    script: Mutex<Vec<Completion>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        _intent: &str,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion> {
        *self.calls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(AgentError::Provider("script exhausted".into()));
        }
        Ok(script.remove(0))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Counts executions; used to prove gating and cancellation skip the tool.
struct CountingTool {
    name: &'static str,
    confirm: bool,
    executions: Arc<Mutex<usize>>,
    result: ToolResult,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "counting test tool"
    }
    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }
    fn requires_confirmation(&self) -> bool {
        self.confirm
    }
    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        *self.executions.lock().unwrap() += 1;
        Ok(self.result.clone())
    }
}

fn envelope(name: &str, arguments: Value) -> Completion {
    Completion::text(
        &json!({"tool_call": {"name": name, "arguments": arguments}}).to_string(),
        TokenUsage::new(30, 10),
        "cpm-large",
    )
}

fn text(content: &str) -> Completion {
    Completion::text(content, TokenUsage::new(20, 5), "cpm-large")
}

/// Route turn logs through the test harness; safe to call from every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    agent: Agent,
    store: Arc<MemoryHistoryStore>,
    provider: Arc<ScriptedProvider>,
    executions: Arc<Mutex<usize>>,
}

fn harness(script: Vec<Completion>, confirm: bool) -> Harness {
    init_tracing();
    let executions = Arc::new(Mutex::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CountingTool {
        name: "project_lookup",
        confirm,
        executions: executions.clone(),
        result: ToolResult::ok(json!({"found": true})),
    }));

    let store = Arc::new(MemoryHistoryStore::new());
    let provider = Arc::new(ScriptedProvider::new(script));
    let agent = Agent::new(store.clone(), provider.clone(), Arc::new(registry));
    Harness {
        agent,
        store,
        provider,
        executions,
    }
}

#[tokio::test]
async fn zero_tool_turn_persists_user_and_final_only() {
    let h = harness(vec![text("Nothing needs attention.")], false);
    let session = SessionRecord::new("s1", "u1", "c1");

    let response = h
        .agent
        .process_message(&session, "Anything urgent?", ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(response.content, "Nothing needs attention.");
    assert!(response.tool_calls.is_none());
    assert_eq!(h.provider.call_count(), 1);

    let log = h.store.list_messages("s1", 50).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].tokens.unwrap().total, 25);
}

#[tokio::test]
async fn three_tool_calls_mean_four_llm_round_trips() {
    let h = harness(
        vec![
            envelope("project_lookup", json!({"q": 1})),
            envelope("project_lookup", json!({"q": 2})),
            envelope("project_lookup", json!({"q": 3})),
            text("Here is what I found."),
        ],
        false,
    );
    let session = SessionRecord::new("s1", "u1", "c1");

    let response = h
        .agent
        .process_message(&session, "dig in", ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 4);
    assert_eq!(*h.executions.lock().unwrap(), 3);
    let calls = response.tool_calls.unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.success()));
    assert_eq!(response.content, "Here is what I found.");

    // Session metrics reflect the whole turn: 3 envelopes + 1 final.
    let metrics = h.store.session_metrics("s1").await.unwrap();
    assert_eq!(metrics.total, 3 * 40 + 25);
}

#[tokio::test]
async fn budget_exhaustion_executes_exactly_max_and_summarizes() {
    let max = 3usize;
    // The model never stops asking for tools.
    let script: Vec<Completion> = (0..=max)
        .map(|i| envelope("project_lookup", json!({"i": i})))
        .collect();
    let h = harness(script, false);
    let session = SessionRecord::new("s1", "u1", "c1");
    let opts = ProcessOptions::default()
        .with_config(RunOptions::default().with_max_tool_calls(max as u32));

    let response = h.agent.process_message(&session, "go", opts).await.unwrap();

    assert_eq!(*h.executions.lock().unwrap(), max);
    assert_eq!(h.provider.call_count(), max + 1);
    assert!(response.content.contains("tool call limit"));
    // One summary line per attempted call.
    assert_eq!(
        response.content.matches("- project_lookup: Completed").count(),
        max
    );

    let log = h.store.list_messages("s1", 50).await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("tool call limit"));
}

#[tokio::test]
async fn confirmation_gate_blocks_execution_in_advisory_mode() {
    let h = harness(
        vec![
            envelope("project_lookup", json!({})),
            text("I need your approval to run that."),
        ],
        true,
    );
    let session = SessionRecord::new("s1", "u1", "c1");

    let response = h
        .agent
        .process_message(&session, "do it", ProcessOptions::default())
        .await
        .unwrap();

    // The tool body never ran.
    assert_eq!(*h.executions.lock().unwrap(), 0);
    let calls = response.tool_calls.unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0]
        .error
        .as_deref()
        .unwrap()
        .contains("requires user confirmation"));

    // The refusal is recorded on the persisted tool message.
    let log = h.store.list_messages("s1", 50).await.unwrap();
    let tool_msg = log.iter().find(|m| m.is_tool_result()).unwrap();
    assert_eq!(tool_msg.requires_confirmation, Some(true));
}

#[tokio::test]
async fn autonomous_tenant_passes_confirmation_gate() {
    let h = harness(
        vec![envelope("project_lookup", json!({})), text("Done.")],
        true,
    );
    h.store
        .set_agent_config(
            "c1",
            TenantAgentConfig {
                autonomy: AutonomyLevel::Autonomous,
                ..Default::default()
            },
        )
        .await;
    let session = SessionRecord::new("s1", "u1", "c1");

    let response = h
        .agent
        .process_message(&session, "do it", ProcessOptions::default())
        .await
        .unwrap();

    assert_eq!(*h.executions.lock().unwrap(), 1);
    assert!(response.tool_calls.unwrap()[0].success());
}

#[tokio::test]
async fn preset_cancellation_aborts_before_any_work() {
    let h = harness(vec![text("never sent")], false);
    let session = SessionRecord::new("s1", "u1", "c1");

    let cancel = CancelSignal::new();
    cancel.set();
    let opts = ProcessOptions::default().with_cancel(cancel);

    let err = h.agent.process_message(&session, "hi", opts).await.unwrap_err();
    assert!(matches!(err, AgentError::Aborted(_)));
    assert_eq!(h.provider.call_count(), 0);
    assert_eq!(*h.executions.lock().unwrap(), 0);
}

#[tokio::test]
async fn rfi_draft_turn_streams_ordered_events() {
    struct DraftTool;

    #[async_trait]
    impl Tool for DraftTool {
        fn name(&self) -> &str {
            "draft_rfi_response"
        }
        fn description(&self) -> &str {
            "Draft a response to an RFI"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"rfi_id": {"type": "string"}}})
        }
        async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolResult> {
            Ok(ToolResult::ok(json!({
                "rfi_id": input["rfi_id"],
                "draft": "Per detail 5/A3.1, the embed plate is required."
            })))
        }
    }

    init_tracing();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DraftTool));
    let store = Arc::new(MemoryHistoryStore::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        envelope("draft_rfi_response", json!({"rfi_id": "rfi-42"})),
        text("I drafted a response citing detail 5/A3.1."),
    ]));
    let agent = Agent::new(store.clone(), provider, Arc::new(registry));

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = events.clone();
        Arc::new(move |event: StreamEvent| {
            let tag = serde_json::to_value(&event).unwrap()["type"]
                .as_str()
                .unwrap()
                .to_string();
            events.lock().unwrap().push(tag);
        }) as Arc<dyn Fn(StreamEvent) + Send + Sync>
    };

    let session = SessionRecord::new("s1", "u1", "c1");
    let opts = ProcessOptions::default().with_stream(sink);
    let response = agent
        .process_message(&session, "Draft a response to RFI 42", opts)
        .await
        .unwrap();

    assert_eq!(response.content, "I drafted a response citing detail 5/A3.1.");
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "tool_call_start",
            "tool_result",
            "tool_call_end",
            "text_delta",
            "message_complete",
        ]
    );
}

#[tokio::test]
async fn streaming_disabled_emits_nothing() {
    let h = harness(vec![text("quiet")], false);
    let session = SessionRecord::new("s1", "u1", "c1");

    let events: Arc<Mutex<Vec<StreamEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = events.clone();
        Arc::new(move |event: StreamEvent| {
            events.lock().unwrap().push(event);
        }) as Arc<dyn Fn(StreamEvent) + Send + Sync>
    };
    let opts = ProcessOptions::default()
        .with_stream(sink)
        .with_config(RunOptions::default().with_streaming(false));

    h.agent.process_message(&session, "hi", opts).await.unwrap();
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tool_failure_is_folded_into_the_conversation() {
    init_tracing();
    let executions = Arc::new(Mutex::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CountingTool {
        name: "project_lookup",
        confirm: false,
        executions: executions.clone(),
        result: ToolResult::err("project not found"),
    }));
    let store = Arc::new(MemoryHistoryStore::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        envelope("project_lookup", json!({"q": "x"})),
        text("I could not find that project."),
    ]));
    let agent = Agent::new(store.clone(), provider, Arc::new(registry));
    let session = SessionRecord::new("s1", "u1", "c1");

    let response = agent
        .process_message(&session, "look up x", ProcessOptions::default())
        .await
        .unwrap();

    // The turn still completes normally.
    assert_eq!(response.content, "I could not find that project.");
    let calls = response.tool_calls.unwrap();
    assert_eq!(calls[0].error.as_deref(), Some("project not found"));

    let log = store.list_messages("s1", 50).await.unwrap();
    let tool_msg = log.iter().find(|m| m.is_tool_result()).unwrap();
    assert_eq!(tool_msg.tool_error.as_deref(), Some("project not found"));
}

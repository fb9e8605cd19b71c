//! Agent context and prompt assembly
//!
//! [`ContextBuilder`] turns a session record plus the tenant's stored agent
//! configuration into the immutable [`AgentContext`] a turn runs under.
//! Configuration fetch failures are logged and replaced with defaults, so
//! conversational continuity survives a briefly unavailable config store.
//!
//! [`PromptAssembler`] renders the system prompt (role prompt + session
//! context) and maps stored history into the linear message sequence the
//! completion client consumes turn over turn.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::config::{AutonomyLevel, FeatureSet, TenantAgentConfig};
use crate::session::{EntityRef, HistoryStore, Message, Role, SessionRecord};

/// Cooperative cancellation signal threaded through a turn.
///
/// Checked at the top of every loop iteration; a tool already running is
/// allowed to finish before cancellation takes effect.
///
/// # Example
/// ```
/// use foreman::agent::CancelSignal;
///
/// let signal = CancelSignal::new();
/// assert!(!signal.is_set());
/// signal.set();
/// assert!(signal.is_set());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Immutable per-turn context.
///
/// Built once per `process_message` call and owned by the loop for its
/// duration; policy (autonomy, features) comes from tenant configuration,
/// identity and entity scope from the session record.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Session identifier (message-log key)
    pub session_id: String,
    /// The user driving this turn
    pub user_id: String,
    /// The tenant company
    pub company_id: String,
    /// Optional project scope
    pub project_id: Option<String>,
    /// Tenant master switch; turns fail fast when false
    pub enabled: bool,
    /// Autonomy level for confirmation gating
    pub autonomy: AutonomyLevel,
    /// Per-feature flags (shared value type with the event bridge)
    pub features: FeatureSet,
    /// Entity the user is currently looking at, if any
    pub current_entity: Option<EntityRef>,
    /// User preference bag
    pub preferences: BTreeMap<String, Value>,
    /// Cooperative cancellation signal, if the caller supplied one
    pub cancel: Option<CancelSignal>,
    /// The persisted user message that opened this turn, when known
    pub origin_message_id: Option<String>,
}

impl AgentContext {
    /// Whether the user has opted into auto-confirmation of gated tools.
    pub fn auto_confirm_tools(&self) -> bool {
        self.preferences
            .get("auto_confirm_tools")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether cancellation has been requested for this turn.
    pub fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(CancelSignal::is_set).unwrap_or(false)
    }
}

/// Builds the per-turn [`AgentContext`].
pub struct ContextBuilder;

impl ContextBuilder {
    /// Assemble the context for one turn.
    ///
    /// Tenant configuration is fetched by company id; absence or a fetch
    /// error both fall back to defaults (autonomy `suggest_only`, every
    /// feature enabled). Fetch errors are logged, never propagated.
    pub async fn build(
        store: &dyn HistoryStore,
        session: &SessionRecord,
        cancel: Option<CancelSignal>,
        origin_message_id: Option<String>,
    ) -> AgentContext {
        let config = match store.get_agent_config(&session.company_id).await {
            Ok(Some(config)) => config,
            Ok(None) => TenantAgentConfig::default(),
            Err(e) => {
                warn!(
                    company_id = %session.company_id,
                    error = %e,
                    "Agent config fetch failed, using defaults"
                );
                TenantAgentConfig::default()
            }
        };

        AgentContext {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            company_id: session.company_id.clone(),
            project_id: session.project_id.clone(),
            enabled: config.enabled,
            autonomy: config.autonomy,
            features: config.features,
            current_entity: session.current_entity.clone(),
            preferences: session.preferences.clone(),
            cancel,
            origin_message_id,
        }
    }
}

/// Default role/capability prompt for the construction assistant.
const ROLE_PROMPT: &str = r#"You are the project assistant for a construction management platform.

You help project teams with RFIs, submittals, permits, daily logs, equipment, and documents. You have access to domain tools; use them when a question needs live project data, and answer directly when it does not.

Be concise and specific. Cite the records you used."#;

/// Assembles prompts and maps stored history into the sequence the
/// completion client consumes.
///
/// # Example
/// ```
/// use foreman::agent::PromptAssembler;
///
/// let assembler = PromptAssembler::new().with_role_prompt("You are a test assistant.");
/// ```
pub struct PromptAssembler {
    role_prompt: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptAssembler {
    /// Create an assembler with the default role prompt.
    pub fn new() -> Self {
        Self {
            role_prompt: ROLE_PROMPT.to_string(),
        }
    }

    /// Override the role prompt.
    pub fn with_role_prompt(mut self, prompt: &str) -> Self {
        self.role_prompt = prompt.to_string();
        self
    }

    /// Render the single system message: role prompt plus session context.
    pub fn system_message(&self, ctx: &AgentContext) -> Message {
        let mut content = self.role_prompt.clone();
        if let Some(section) = render_context_section(ctx) {
            content.push_str("\n\n");
            content.push_str(&section);
        }
        Message::system(&content)
    }

    /// Build the full message sequence: system message, then the bounded
    /// history window mapped message by message.
    ///
    /// `user`/`assistant` entries pass through verbatim (assistant entries
    /// keep their tool-call list); `tool` entries are re-serialized with the
    /// tool's recorded output (or error) as JSON content.
    pub fn assemble(&self, ctx: &AgentContext, history: &[Message]) -> Vec<Message> {
        let mut out = Vec::with_capacity(history.len() + 1);
        out.push(self.system_message(ctx));
        for msg in history {
            match msg.role {
                Role::User | Role::Assistant => out.push(msg.clone()),
                Role::Tool => out.push(remap_tool_message(msg)),
                // System entries are never persisted; drop any stray ones.
                Role::System => {}
            }
        }
        out
    }
}

fn render_context_section(ctx: &AgentContext) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(ref project_id) = ctx.project_id {
        parts.push(format!("- Project: {}", project_id));
    }
    if let Some(ref entity) = ctx.current_entity {
        parts.push(format!(
            "- The user is currently viewing {} {}",
            entity.entity_type, entity.id
        ));
    }
    if ctx.autonomy == AutonomyLevel::SuggestOnly {
        parts.push(
            "- Advisory mode: propose consequential actions, do not assume they ran".to_string(),
        );
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("## Session Context\n\n{}", parts.join("\n")))
}

/// Re-serialize a stored tool message for the prompt: the content becomes
/// the JSON of the recorded output, or an error object on failure.
fn remap_tool_message(msg: &Message) -> Message {
    let content = match (&msg.tool_output, &msg.tool_error) {
        (Some(output), _) => output.to_string(),
        (None, Some(error)) => serde_json::json!({ "error": error }).to_string(),
        (None, None) => msg.content.clone(),
    };
    let mut out = Message::tool_result(
        msg.tool_call_id.as_deref().unwrap_or(""),
        msg.tool_name.as_deref().unwrap_or(""),
        &content,
        msg.tool_input.clone().unwrap_or(Value::Null),
        msg.tool_output.clone(),
        msg.tool_error.clone(),
    );
    out.id = msg.id.clone();
    out
}

//! Configuration types for Foreman
//!
//! Two layers of configuration exist:
//!
//! - [`TenantAgentConfig`] is fetched per company from the host application's
//!   store and controls policy: whether the agent is enabled at all, the
//!   autonomy level, and which AI features are switched on.
//! - [`RunOptions`] is the per-call configuration surface (iteration budget,
//!   token limit, temperature, streaming), overridable on every
//!   `process_message` invocation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default maximum number of tool calls permitted in one turn.
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 10;
/// Default maximum tokens per completion request.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Autonomy level controlling whether confirmation-requiring tools may
/// execute without explicit user approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// Advisory mode: consequential tools are gated behind confirmation.
    #[default]
    SuggestOnly,
    /// The agent may execute confirmation-requiring tools unattended.
    Autonomous,
}

impl std::fmt::Display for AutonomyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutonomyLevel::SuggestOnly => write!(f, "suggest_only"),
            AutonomyLevel::Autonomous => write!(f, "autonomous"),
        }
    }
}

/// Immutable per-feature flag set, shared by the context builder and the
/// event bridge so the two can never drift apart.
///
/// Unknown feature keys default to enabled; an explicit `false` is the only
/// way to disable a capability. The empty set therefore means "everything
/// enabled", which is also the defaults posture when tenant configuration
/// is absent.
///
/// # Example
/// ```
/// use foreman::config::FeatureSet;
///
/// let features = FeatureSet::all_enabled();
/// assert!(features.is_enabled("document_processing"));
///
/// let features = FeatureSet::from_flags([("rfi_drafting".to_string(), false)]);
/// assert!(!features.is_enabled("rfi_drafting"));
/// assert!(features.is_enabled("permit_tracking"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FeatureSet {
    flags: BTreeMap<String, bool>,
}

impl FeatureSet {
    /// The defaults value: every feature flag enabled.
    pub fn all_enabled() -> Self {
        Self::default()
    }

    /// Build a feature set from explicit flags.
    pub fn from_flags<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        Self {
            flags: flags.into_iter().collect(),
        }
    }

    /// Whether the named feature is enabled. Missing keys are enabled.
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.flags.get(feature).copied().unwrap_or(true)
    }

    /// Whether any AI capability is enabled at all.
    ///
    /// Used by the completion client's fail-fast guard: a tenant that has
    /// explicitly disabled every feature gets a configuration error before
    /// any network call.
    pub fn any_enabled(&self) -> bool {
        self.flags.is_empty() || self.flags.values().any(|v| *v)
    }
}

/// Per-tenant agent configuration, fetched by company id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAgentConfig {
    /// Master switch; when false the event bridge no-ops and turns fail fast.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Autonomy level for confirmation gating.
    #[serde(default)]
    pub autonomy: AutonomyLevel,
    /// Per-feature flags (`features_enabled` in the stored row).
    #[serde(default, rename = "features_enabled")]
    pub features: FeatureSet,
    /// Optional model override for this tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for TenantAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            autonomy: AutonomyLevel::SuggestOnly,
            features: FeatureSet::all_enabled(),
            model: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-call run options.
///
/// All fields carry the documented defaults and every one is overridable
/// per `process_message` call.
///
/// # Example
/// ```
/// use foreman::config::RunOptions;
///
/// let opts = RunOptions::default().with_max_tool_calls(3);
/// assert_eq!(opts.max_tool_calls, 3);
/// assert_eq!(opts.max_tokens, 4096);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Maximum tool calls in one turn before degradation to a summary.
    pub max_tool_calls: u32,
    /// Maximum tokens per completion request.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to emit streamed events to the caller's sink.
    pub stream_responses: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stream_responses: true,
        }
    }
}

impl RunOptions {
    /// Override the iteration budget.
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    /// Override the token limit.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable or disable streamed events.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream_responses = stream;
        self
    }
}

//! Tool registry for Foreman
//!
//! A name→tool map populated once at process start and treated as read-only
//! thereafter, so concurrent turns share it without locking. Lookup is a
//! pure function: resolving the same name twice returns the same descriptor
//! and has no side effects.

use std::collections::HashMap;

use tracing::info;

use crate::agent::AgentContext;

use super::{Tool, ToolDefinition};

/// A registry that holds the closed set of domain tools.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(PermitStatusTool));
/// assert!(registry.has("permit_status"));
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Catalog definitions for every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| definition(t.as_ref())).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Catalog definitions filtered by the caller's context.
    ///
    /// A tool is omitted when its gating feature is disabled for the tenant
    /// or when it is restricted to entity types the current entity does not
    /// match. Confirmation-requiring tools stay visible in advisory mode so
    /// the model can propose them; the executor enforces the confirmation
    /// boundary at execution time. Sorted by name, which is also the order
    /// tool calls within one LLM turn are offered and resolved in.
    pub fn available_for(&self, ctx: &AgentContext) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| {
                if let Some(feature) = t.feature() {
                    if !ctx.features.is_enabled(feature) {
                        return false;
                    }
                }
                let kinds = t.entity_kinds();
                if !kinds.is_empty() {
                    match ctx.current_entity.as_ref() {
                        Some(entity) => {
                            if !kinds.contains(&entity.entity_type.as_str()) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                true
            })
            .map(|t| definition(t.as_ref()))
            .collect();

        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

fn definition(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters(),
        requires_confirmation: tool.requires_confirmation(),
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

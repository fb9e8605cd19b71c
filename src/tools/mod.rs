//! Domain tool contract and registry.

mod registry;
mod types;

pub use registry::ToolRegistry;
pub use types::{Tool, ToolCallResult, ToolContext, ToolDefinition, ToolResult};

//! Foreman - AI agent orchestration for construction project management

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{Agent, AgentContext, AgentResponse, CancelSignal, ProcessOptions, StreamEvent};
pub use config::{AutonomyLevel, FeatureSet, RunOptions, TenantAgentConfig};
pub use error::{AgentError, Result};
pub use events::{AgentEvent, EventBridge, MemoryTaskQueue, TaskQueue, TaskRecord};
pub use providers::{
    Completion, CompletionOptions, CompletionProvider, HttpCompletionProvider,
};
pub use session::{HistoryStore, MemoryHistoryStore, Message, Role, SessionRecord, ToolCall};
pub use tools::{Tool, ToolContext, ToolDefinition, ToolRegistry, ToolResult};

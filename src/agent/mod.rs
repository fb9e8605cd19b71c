//! Agent module - orchestration core
//!
//! This module holds the turn machinery: the per-turn context and prompt
//! assembly, the tool executor, the streamed event protocol, and the
//! [`Agent`] entry point that drives the bounded tool-calling loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌────────────────────┐
//! │ Host request │────>│    Agent    │────>│ CompletionProvider │
//! │  (session)   │     │   (loop)    │     │                    │
//! └──────────────┘     └─────────────┘     └────────────────────┘
//!                             │
//!                ┌────────────┼────────────┐
//!                ▼            ▼            ▼
//!         ┌────────────┐ ┌──────────┐ ┌──────────┐
//!         │HistoryStore│ │ Registry │ │StreamSink│
//!         └────────────┘ └──────────┘ └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use foreman::agent::{Agent, ProcessOptions};
//! use foreman::providers::HttpCompletionProvider;
//! use foreman::session::{MemoryHistoryStore, SessionRecord};
//! use foreman::tools::ToolRegistry;
//!
//! async fn run() {
//!     let store = Arc::new(MemoryHistoryStore::new());
//!     let provider = Arc::new(HttpCompletionProvider::new("https://llm.internal", "key"));
//!     let registry = Arc::new(ToolRegistry::new());
//!     let agent = Agent::new(store, provider, registry);
//!
//!     let session = SessionRecord::new("sess-1", "user-1", "co-1");
//!     let response = agent
//!         .process_message(&session, "What needs attention today?", ProcessOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{}", response.content);
//! }
//! ```

mod context;
mod executor;
mod r#loop;
mod stream;

pub use context::{AgentContext, CancelSignal, ContextBuilder, PromptAssembler};
pub use executor::{ExecutionOutcome, ToolExecutor};
pub use r#loop::{Agent, AgentResponse, ProcessOptions, SuggestedAction};
pub use stream::{StreamEvent, StreamSink, ToolCallRef, ToolResultChunk};

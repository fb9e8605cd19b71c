//! LLM completion providers and tool-call extraction.

mod client;
mod extract;
mod http;
mod types;

pub use client::{CompletionClient, LlmTurn};
pub use extract::{EnvelopeExtractor, StructuredExtractor, ToolCallExtractor};
pub use http::HttpCompletionProvider;
pub use types::{Completion, CompletionOptions, CompletionProvider};

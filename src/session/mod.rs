//! Session and conversation-history types.

mod store;
mod types;

pub use store::{HistoryStore, MemoryHistoryStore};
pub use types::{EntityRef, Message, Role, SessionRecord, TokenUsage, ToolCall};

#[cfg(test)]
pub use store::MockHistoryStore;

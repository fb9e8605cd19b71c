//! History store seam
//!
//! The orchestrator never owns persistence; it talks to the host
//! application's storage through [`HistoryStore`]. A [`MemoryHistoryStore`]
//! backend is provided for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::TenantAgentConfig;
use crate::error::Result;
use crate::session::{Message, TokenUsage};

/// Persistence seam for conversation history, tenant configuration, and
/// session metrics.
///
/// Message inserts are single-row appends; the log is never mutated.
/// Implementations assign the message id on insert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch the most recent `limit` messages for a session, oldest first.
    async fn list_messages(&self, session_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Append one message to the session log, returning it with its
    /// store-assigned id.
    async fn insert_message(&self, session_id: &str, message: Message) -> Result<Message>;

    /// Fetch the tenant's agent configuration, if any.
    async fn get_agent_config(&self, company_id: &str) -> Result<Option<TenantAgentConfig>>;

    /// Record the turn's accumulated token usage against the session.
    async fn update_session_metrics(&self, session_id: &str, tokens: &TokenUsage) -> Result<()>;
}

/// In-memory history store for tests and local development.
///
/// # Example
/// ```
/// use foreman::session::{MemoryHistoryStore, HistoryStore, Message};
///
/// # tokio_test::block_on(async {
/// let store = MemoryHistoryStore::new();
/// store.insert_message("sess-1", Message::user("hi")).await.unwrap();
/// let messages = store.list_messages("sess-1", 10).await.unwrap();
/// assert_eq!(messages.len(), 1);
/// # });
/// ```
#[derive(Default)]
pub struct MemoryHistoryStore {
    messages: Mutex<HashMap<String, Vec<Message>>>,
    configs: Mutex<HashMap<String, TenantAgentConfig>>,
    metrics: Mutex<HashMap<String, TokenUsage>>,
}

impl MemoryHistoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tenant configuration.
    pub async fn set_agent_config(&self, company_id: &str, config: TenantAgentConfig) {
        self.configs
            .lock()
            .await
            .insert(company_id.to_string(), config);
    }

    /// Total messages stored for a session (test helper).
    pub async fn message_count(&self, session_id: &str) -> usize {
        self.messages
            .lock()
            .await
            .get(session_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Accumulated metrics for a session (test helper).
    pub async fn session_metrics(&self, session_id: &str) -> Option<TokenUsage> {
        self.metrics.lock().await.get(session_id).copied()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list_messages(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        let messages = self.messages.lock().await;
        let log = messages.get(session_id).cloned().unwrap_or_default();
        let skip = log.len().saturating_sub(limit);
        Ok(log.into_iter().skip(skip).collect())
    }

    async fn insert_message(&self, session_id: &str, mut message: Message) -> Result<Message> {
        message.id = Some(Uuid::new_v4().to_string());
        let mut messages = self.messages.lock().await;
        messages
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn get_agent_config(&self, company_id: &str) -> Result<Option<TenantAgentConfig>> {
        Ok(self.configs.lock().await.get(company_id).cloned())
    }

    async fn update_session_metrics(&self, session_id: &str, tokens: &TokenUsage) -> Result<()> {
        let mut metrics = self.metrics.lock().await;
        metrics
            .entry(session_id.to_string())
            .or_default()
            .add(tokens);
        Ok(())
    }
}

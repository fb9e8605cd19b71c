//! Event bridge - domain events to background tasks
//!
//! The host application publishes domain events (a document was uploaded, an
//! RFI was created) and the bridge decides whether an AI background task
//! should run for them. Three gates apply in order: the tenant master
//! switch, the event's feature flag, and the event→task routing table.
//! Everything that does not pass a gate is a silent no-op; the bridge never
//! fails an event for policy reasons.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::session::HistoryStore;

/// Closed routing table: event type → (gating feature, task type).
const EVENT_ROUTES: &[(&str, &str, &str)] = &[
    ("document_uploaded", "document_processing", "document_classify"),
    ("rfi_created", "rfi_drafting", "rfi_draft_response"),
    ("daily_log_created", "daily_log_parsing", "daily_log_parse"),
    ("permit_expiring", "permit_tracking", "permit_expiry_review"),
    ("safety_incident_reported", "safety_analysis", "incident_summarize"),
];

fn route_for(event_type: &str) -> Option<(&'static str, &'static str)> {
    EVENT_ROUTES
        .iter()
        .find(|(event, _, _)| *event == event_type)
        .map(|(_, feature, task)| (*feature, *task))
}

/// A domain event published by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event type (e.g. "document_uploaded")
    pub event_type: String,
    /// The tenant company the event belongs to
    pub company_id: String,
    /// Optional project scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Type of the entity the event concerns
    pub entity_type: String,
    /// Identifier of the entity the event concerns
    pub entity_id: String,
    /// Event payload, passed through to the task
    #[serde(default)]
    pub data: Value,
    /// The user who caused the event, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AgentEvent {
    /// Create a new event.
    ///
    /// # Example
    /// ```
    /// use foreman::events::AgentEvent;
    ///
    /// let event = AgentEvent::new("document_uploaded", "co-1", "document", "doc-9");
    /// assert_eq!(event.event_type, "document_uploaded");
    /// ```
    pub fn new(event_type: &str, company_id: &str, entity_type: &str, entity_id: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            company_id: company_id.to_string(),
            project_id: None,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data: Value::Null,
            user_id: None,
        }
    }

    /// Scope the event to a project.
    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    /// Attach the event payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Attach the causing user.
    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Deduplication key for the task this event would create.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}:{}", self.event_type, self.entity_id, self.company_id)
    }
}

/// Lifecycle status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker
    #[default]
    Pending,
    /// A worker is executing it
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// A queued background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier (assigned by the queue on insert)
    pub id: String,
    /// Task type, resolved as a tool name by the worker
    pub task_type: String,
    /// The tenant company
    pub company_id: String,
    /// Optional project scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Type of the entity the task concerns
    pub entity_type: String,
    /// Identifier of the entity the task concerns
    pub entity_id: String,
    /// Task input, carried over from the event payload
    pub payload: Value,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Deduplication key (`{event_type}:{entity_id}:{company_id}`)
    pub dedup_key: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Build a pending task from a routed event.
    pub fn from_event(task_type: &str, event: &AgentEvent) -> Self {
        Self {
            id: String::new(),
            task_type: task_type.to_string(),
            company_id: event.company_id.clone(),
            project_id: event.project_id.clone(),
            entity_type: event.entity_type.clone(),
            entity_id: event.entity_id.clone(),
            payload: event.data.clone(),
            status: TaskStatus::Pending,
            dedup_key: event.dedup_key(),
            created_at: Utc::now(),
        }
    }
}

/// Queue the bridge inserts tasks into and workers drain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Insert a task, assigning its id. Implementations may deduplicate on
    /// `dedup_key` and return the already-queued task instead.
    async fn enqueue(&self, task: TaskRecord) -> Result<TaskRecord>;

    /// Look up a queued task by deduplication key.
    async fn find_by_dedup_key(&self, key: &str) -> Result<Option<TaskRecord>>;
}

/// In-memory task queue for tests, demos, and local development.
pub struct MemoryTaskQueue {
    tasks: tokio::sync::Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryTaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Number of queued tasks.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Snapshot of pending tasks, ordered by creation time.
    pub async fn pending(&self) -> Vec<TaskRecord> {
        let tasks = self.tasks.lock().await;
        let mut pending: Vec<TaskRecord> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, mut task: TaskRecord) -> Result<TaskRecord> {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(&task.dedup_key) {
            return Ok(existing.clone());
        }
        if task.id.is_empty() {
            task.id = Uuid::new_v4().to_string();
        }
        tasks.insert(task.dedup_key.clone(), task.clone());
        Ok(task)
    }

    async fn find_by_dedup_key(&self, key: &str) -> Result<Option<TaskRecord>> {
        Ok(self.tasks.lock().await.get(key).cloned())
    }
}

/// Routes domain events to background tasks.
///
/// # Example
///
/// ```rust,ignore
/// let bridge = EventBridge::new(store, queue);
/// let event = AgentEvent::new("document_uploaded", "co-1", "document", "doc-9");
/// if let Some(task) = bridge.handle_event(&event).await? {
///     println!("queued {}", task.task_type);
/// }
/// ```
pub struct EventBridge {
    store: Arc<dyn HistoryStore>,
    queue: Arc<dyn TaskQueue>,
}

impl EventBridge {
    /// Create a bridge over the tenant config store and a task queue.
    pub fn new(store: Arc<dyn HistoryStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Handle one domain event.
    ///
    /// Returns the queued task when the event passes every gate, `None`
    /// when any gate declines it. Store and queue failures propagate so the
    /// host can retry delivery.
    pub async fn handle_event(&self, event: &AgentEvent) -> Result<Option<TaskRecord>> {
        // Gate order: tenant config, then feature flag, then the task route.
        let config = self
            .store
            .get_agent_config(&event.company_id)
            .await?
            .unwrap_or_default();

        if !config.enabled {
            debug!(
                event = %event.event_type,
                company_id = %event.company_id,
                "Agent disabled for tenant, dropping event"
            );
            return Ok(None);
        }

        let (feature, task_type) = match route_for(&event.event_type) {
            Some(route) => route,
            None => {
                debug!(event = %event.event_type, "No task route for event");
                return Ok(None);
            }
        };

        if !config.features.is_enabled(feature) {
            debug!(
                event = %event.event_type,
                feature,
                "Feature disabled for tenant, dropping event"
            );
            return Ok(None);
        }

        let dedup_key = event.dedup_key();
        if let Some(existing) = self.queue.find_by_dedup_key(&dedup_key).await? {
            debug!(dedup_key = %dedup_key, task_id = %existing.id, "Duplicate event, reusing task");
            return Ok(Some(existing));
        }

        let task = self
            .queue
            .enqueue(TaskRecord::from_event(task_type, event))
            .await?;
        info!(
            event = %event.event_type,
            task_type,
            task_id = %task.id,
            entity_id = %event.entity_id,
            "Queued background task"
        );
        Ok(Some(task))
    }
}

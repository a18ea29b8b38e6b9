//! Task ledger — durable record of each agent unit invocation.
//!
//! One `AgentTask` per (unit, message) invocation. Tasks are finalized
//! exactly once and never reopened or deleted by the core; archival belongs
//! to the persistence collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::persist::Persistence;

// ── Status ──────────────────────────────────────────────────────────

/// Status of an agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Completed and failed tasks are final.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ── Task ────────────────────────────────────────────────────────────

/// Ledger entry for one agent unit invocation over one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: Uuid,
    /// Id of the agent unit that ran.
    pub unit_id: String,
    /// Id of the message it ran over.
    pub message_id: Uuid,
    /// Action name (e.g. "process").
    pub action: String,
    /// Parameter snapshot taken when the task was created.
    pub params: serde_json::Value,
    pub status: TaskStatus,
    /// Result payload on completion.
    pub result: Option<serde_json::Value>,
    /// Error description on failure. Non-empty when status is `failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    /// Create a pending task for one unit invocation.
    pub fn new(unit_id: impl Into<String>, message_id: Uuid, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_id: unit_id.into(),
            message_id,
            action: action.into(),
            params: serde_json::Value::Null,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Move pending → processing.
    pub fn start(&mut self) -> Result<(), String> {
        self.transition(TaskStatus::Processing)
    }

    /// Finalize as completed with a result payload.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<(), String> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Finalize as failed with an error description.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), String> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, target: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition task {} from {} to {}",
                self.id, self.status, target
            ));
        }
        self.status = target;
        Ok(())
    }
}

// ── Ledger ──────────────────────────────────────────────────────────

/// In-memory task record with write-through to the persistence collaborator.
pub struct TaskLedger {
    tasks: RwLock<HashMap<Uuid, AgentTask>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            persistence: Some(persistence),
        }
    }

    /// Record (insert or update) a task and write it through.
    ///
    /// A write-through failure is surfaced: the ledger is the durable record
    /// of pipeline work and the executor treats its unavailability as fatal.
    pub async fn record(&self, task: &AgentTask) -> Result<(), StorageError> {
        self.tasks.write().await.insert(task.id, task.clone());
        if let Some(ref persistence) = self.persistence {
            persistence.save_agent_task(task).await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Option<AgentTask> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// All tasks recorded for one agent unit, oldest first.
    pub async fn tasks_for_unit(&self, unit_id: &str) -> Vec<AgentTask> {
        let mut tasks: Vec<AgentTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.unit_id == unit_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// All tasks recorded for one message, oldest first.
    pub async fn tasks_for_message(&self, message_id: Uuid) -> Vec<AgentTask> {
        let mut tasks: Vec<AgentTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.message_id == message_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    pub async fn count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

impl Default for TaskLedger {
    fn default() -> Self {
        Self::new()
    }
}

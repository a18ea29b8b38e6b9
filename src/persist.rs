//! Persistence collaborator interface.
//!
//! The engine treats persistence as an async by-id store with single-record
//! writes and no transactional guarantees. Concrete backends (SQL, object
//! storage) live outside the core; tests use in-memory mocks.

use async_trait::async_trait;
use uuid::Uuid;

use crate::campaign::draft::Draft;
use crate::campaign::model::Campaign;
use crate::error::StorageError;
use crate::pipeline::ledger::AgentTask;

/// Backend-agnostic persistence trait for tasks, campaigns, and drafts.
#[async_trait]
pub trait Persistence: Send + Sync {
    // ── Agent tasks ─────────────────────────────────────────────────

    /// Insert or update one agent task record.
    async fn save_agent_task(&self, task: &AgentTask) -> Result<(), StorageError>;

    /// All task records for one agent unit.
    async fn agent_tasks_for_unit(&self, unit_id: &str) -> Result<Vec<AgentTask>, StorageError>;

    // ── Campaigns ───────────────────────────────────────────────────

    /// Insert or update one campaign record.
    async fn save_campaign(&self, campaign: &Campaign) -> Result<(), StorageError>;

    /// Delete a campaign record.
    async fn delete_campaign(&self, id: Uuid) -> Result<(), StorageError>;

    /// Load all campaign records (startup recovery).
    async fn load_campaigns(&self) -> Result<Vec<Campaign>, StorageError>;

    // ── Drafts ──────────────────────────────────────────────────────

    /// Insert or update one draft record.
    async fn save_draft(&self, draft: &Draft) -> Result<(), StorageError>;

    /// Load all draft records.
    async fn load_drafts(&self) -> Result<Vec<Draft>, StorageError>;
}

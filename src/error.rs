//! Error types for mailflow.

use uuid::Uuid;

use crate::campaign::CampaignStatus;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Agent unit and registry errors.
///
/// `Processing` is the per-unit, isolated variant — the pipeline captures it
/// into the task ledger and outcome map rather than propagating it.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent unit {id} is already registered")]
    DuplicateUnit { id: String },

    #[error("Agent unit {id} not found")]
    UnitNotFound { id: String },

    #[error("Agent unit {unit} failed to process message: {reason}")]
    Processing { unit: String, reason: String },

    #[error("Agent unit {unit} failed to initialize: {reason}")]
    Init { unit: String, reason: String },
}

/// Campaign lookup and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("Campaign {id} not found")]
    NotFound { id: Uuid },

    #[error("Campaign {id} is {status}, cannot {action}")]
    InvalidState {
        id: Uuid,
        status: CampaignStatus,
        action: String,
    },

    #[error("Campaign {id} has no schedule attached")]
    MissingSchedule { id: Uuid },
}

/// Draft lookup and approval errors.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Draft {id} not found")]
    NotFound { id: Uuid },

    #[error("Draft {id} already decided as {status}")]
    AlreadyDecided { id: Uuid, status: String },
}

/// Schedule derivation errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Invalid frequency descriptor: {0}")]
    InvalidFrequency(String),

    #[error("Invalid recurrence expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Immediate execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Job queue submission/lookup errors. Submission failures are fatal to the
/// scheduling operation that issued them.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job submission failed: {0}")]
    SubmitFailed(String),

    #[error("Job {id} not found")]
    JobNotFound { id: Uuid },

    #[error("Queue is shut down")]
    Shutdown,
}

/// Persistence collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;

//! Asynchronous job queue contract.
//!
//! The scheduler talks to the queue through an explicit, data-first
//! submission contract: delay, recurrence, and retry policy travel as data
//! on the request, never as hidden library defaults. The engine ships an
//! in-process implementation (`InMemoryJobQueue`); a production deployment
//! substitutes a durable one behind the same trait.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

pub use memory::InMemoryJobQueue;

// ── Retry policy ────────────────────────────────────────────────────

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base * 2^(n-1)`.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Backoff before retry `attempt` (1-based; attempt 1 is the first retry).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

// ── Job request ─────────────────────────────────────────────────────

/// When a job should fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobTiming {
    /// Fire once after a delay.
    Once { delay: Duration },
    /// Fire repeatedly on a cron expression, scoped by optional start and
    /// end instants. The timezone is the IANA name the expression should be
    /// evaluated in; the queue owns local-time resolution.
    Repeat {
        expression: String,
        timezone: String,
        after: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    },
}

/// A job submission: type tag, opaque payload, timing, and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub timing: JobTiming,
    pub retry: RetryPolicy,
}

impl JobRequest {
    pub fn once(
        job_type: impl Into<String>,
        payload: serde_json::Value,
        delay: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            timing: JobTiming::Once { delay },
            retry,
        }
    }

    pub fn repeating(
        job_type: impl Into<String>,
        payload: serde_json::Value,
        expression: impl Into<String>,
        timezone: impl Into<String>,
        after: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            timing: JobTiming::Repeat {
                expression: expression.into(),
                timezone: timezone.into(),
                after,
                until,
            },
            retry,
        }
    }
}

// ── Queued job ──────────────────────────────────────────────────────

/// Observable state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for its (first) fire time.
    Delayed,
    /// Currently executing an attempt.
    Active,
    /// Finished successfully (one-shot) or past its end bound (repeating).
    Completed,
    /// Exhausted its retry budget. Left inspectable in the failed listing.
    Failed,
}

/// A job as seen through `list_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub timing: JobTiming,
    pub state: JobState,
    /// Attempts made for the current firing.
    pub attempts_made: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Queue trait ─────────────────────────────────────────────────────

/// Handler invoked when a job fires. Completion/failure feeds the queue's
/// retry machinery.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job_type: &str, payload: &serde_json::Value) -> Result<(), String>;
}

/// Asynchronous job execution substrate consumed by the scheduler.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job. Returns its id. Submission failure is fatal to the
    /// operation that issued it.
    async fn submit(&self, request: JobRequest) -> Result<Uuid, QueueError>;

    /// List jobs currently in any of the given states.
    async fn list_jobs(&self, states: &[JobState]) -> Result<Vec<QueuedJob>, QueueError>;

    /// Remove a job. Waiting/delayed timers are cancelled; an attempt that
    /// is already executing is not recalled.
    async fn remove_job(&self, id: Uuid) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
    }

    #[test]
    fn job_timing_serde_tagged() {
        let timing = JobTiming::Repeat {
            expression: "0 0 9 * * Mon *".into(),
            timezone: "America/New_York".into(),
            after: None,
            until: None,
        };
        let json = serde_json::to_value(&timing).unwrap();
        assert_eq!(json["type"], "repeat");
        assert_eq!(json["timezone"], "America/New_York");
    }
}

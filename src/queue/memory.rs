//! In-process job queue.
//!
//! Timer-driven implementation of the `JobQueue` contract: delayed jobs
//! sleep then run their attempt loop; repeating jobs iterate upcoming cron
//! fire times (evaluated in UTC — a durable queue substitutes local-time
//! resolution for the carried timezone). A firing that exhausts its retry
//! budget leaves the job in the failed listing. Removal cancels pending
//! timers but never recalls an attempt that is already executing.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::queue::{JobHandler, JobQueue, JobRequest, JobState, JobTiming, QueuedJob, RetryPolicy};

/// Maximum random jitter added to each backoff sleep.
const MAX_JITTER_MS: u64 = 250;

struct JobEntry {
    job: QueuedJob,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

type JobMap = Arc<RwLock<HashMap<Uuid, JobEntry>>>;

/// Timer-driven in-process queue.
pub struct InMemoryJobQueue {
    handler: Arc<dyn JobHandler>,
    jobs: JobMap,
}

impl InMemoryJobQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Arc<Self> {
        Arc::new(Self {
            handler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Abort every pending timer and clear the queue.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.write().await;
        for (_, entry) in jobs.drain() {
            entry.cancelled.store(true, Ordering::Relaxed);
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
    }

    async fn set_state(jobs: &JobMap, id: Uuid, state: JobState) {
        if let Some(entry) = jobs.write().await.get_mut(&id) {
            entry.job.state = state;
        }
    }

    async fn record_attempt(jobs: &JobMap, id: Uuid, attempts: u32, error: Option<&str>) {
        if let Some(entry) = jobs.write().await.get_mut(&id) {
            entry.job.attempts_made = attempts;
            entry.job.last_error = error.map(String::from);
        }
    }

    /// Run one firing's attempt loop. Returns false when retries were
    /// exhausted and the job was marked failed.
    async fn run_attempts(
        jobs: &JobMap,
        handler: &Arc<dyn JobHandler>,
        id: Uuid,
        job_type: &str,
        payload: &serde_json::Value,
        retry: &RetryPolicy,
    ) -> bool {
        Self::set_state(jobs, id, JobState::Active).await;

        let max = retry.max_attempts.max(1);
        for attempt in 1..=max {
            match handler.handle(job_type, payload).await {
                Ok(()) => {
                    Self::record_attempt(jobs, id, attempt, None).await;
                    return true;
                }
                Err(e) => {
                    warn!(
                        job_id = %id,
                        job_type,
                        attempt,
                        max,
                        error = %e,
                        "Job attempt failed"
                    );
                    Self::record_attempt(jobs, id, attempt, Some(&e)).await;
                    if attempt < max {
                        let jitter =
                            Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));
                        tokio::time::sleep(retry.backoff_for(attempt) + jitter).await;
                    }
                }
            }
        }

        Self::set_state(jobs, id, JobState::Failed).await;
        false
    }

    fn spawn_once(&self, id: Uuid, request: JobRequest, delay: Duration) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if Self::run_attempts(
                &jobs,
                &handler,
                id,
                &request.job_type,
                &request.payload,
                &request.retry,
            )
            .await
            {
                Self::set_state(&jobs, id, JobState::Completed).await;
            }
        })
    }

    fn spawn_repeating(
        &self,
        id: Uuid,
        request: JobRequest,
        schedule: cron::Schedule,
        after: Option<chrono::DateTime<Utc>>,
        until: Option<chrono::DateTime<Utc>>,
        cancelled: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            loop {
                // Fire times before the start bound are skipped.
                let base = match after {
                    Some(after) if after > Utc::now() => after,
                    _ => Utc::now(),
                };
                let Some(next) = schedule.after(&base).next() else {
                    Self::set_state(&jobs, id, JobState::Completed).await;
                    break;
                };
                if let Some(until) = until
                    && next > until
                {
                    Self::set_state(&jobs, id, JobState::Completed).await;
                    break;
                }

                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                if cancelled.load(Ordering::Relaxed) {
                    break;
                }

                debug!(job_id = %id, fire_at = %next, "Repeating job firing");
                let ok = Self::run_attempts(
                    &jobs,
                    &handler,
                    id,
                    &request.job_type,
                    &request.payload,
                    &request.retry,
                )
                .await;
                if !ok || cancelled.load(Ordering::Relaxed) {
                    // Exhausted firings stay in the failed listing; the
                    // recurrence does not continue past them.
                    break;
                }
                Self::set_state(&jobs, id, JobState::Delayed).await;
            }
        })
    }
}

#[async_trait::async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn submit(&self, request: JobRequest) -> Result<Uuid, QueueError> {
        enum Driver {
            Once(Duration),
            Repeat(
                cron::Schedule,
                Option<chrono::DateTime<Utc>>,
                Option<chrono::DateTime<Utc>>,
            ),
        }

        let id = Uuid::new_v4();
        let cancelled = Arc::new(AtomicBool::new(false));

        // Validate before anything is registered.
        let driver = match &request.timing {
            JobTiming::Once { delay } => Driver::Once(*delay),
            JobTiming::Repeat {
                expression,
                after,
                until,
                ..
            } => {
                let schedule = cron::Schedule::from_str(expression).map_err(|e| {
                    QueueError::SubmitFailed(format!("invalid cron expression '{expression}': {e}"))
                })?;
                Driver::Repeat(schedule, *after, *until)
            }
        };

        let job = QueuedJob {
            id,
            job_type: request.job_type.clone(),
            payload: request.payload.clone(),
            timing: request.timing.clone(),
            state: JobState::Delayed,
            attempts_made: 0,
            last_error: None,
            created_at: Utc::now(),
        };

        // Register the entry before spawning the driver so a fast-firing
        // job always finds its record.
        self.jobs.write().await.insert(
            id,
            JobEntry {
                job,
                cancelled: cancelled.clone(),
                handle: None,
            },
        );

        let handle = match driver {
            Driver::Once(delay) => self.spawn_once(id, request.clone(), delay),
            Driver::Repeat(schedule, after, until) => {
                self.spawn_repeating(id, request.clone(), schedule, after, until, cancelled)
            }
        };

        match self.jobs.write().await.get_mut(&id) {
            Some(entry) => entry.handle = Some(handle),
            // Removed in the window between insert and spawn.
            None => handle.abort(),
        }

        info!(job_id = %id, job_type = %request.job_type, "Job submitted");
        Ok(id)
    }

    async fn list_jobs(&self, states: &[JobState]) -> Result<Vec<QueuedJob>, QueueError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|e| states.contains(&e.job.state))
            .map(|e| e.job.clone())
            .collect())
    }

    async fn remove_job(&self, id: Uuid) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.remove(&id).ok_or(QueueError::JobNotFound { id })?;

        entry.cancelled.store(true, Ordering::Relaxed);
        // An attempt already executing is not recalled; its driver observes
        // the cancellation flag after it finishes.
        if entry.job.state != JobState::Active
            && let Some(handle) = entry.handle
        {
            handle.abort();
        }

        info!(job_id = %id, "Job removed");
        Ok(())
    }
}

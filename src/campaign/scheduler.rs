//! Campaign scheduler — turns a declarative schedule into job submissions
//! and keeps them consistent with campaign status.
//!
//! Recurrence derivation is a pure function; everything stateful goes
//! through the campaign store (status) and the job queue (timers). Pausing
//! removes the campaign's jobs outright; resuming re-derives them from the
//! stored schedule, so a pause/resume cycle cannot duplicate firings.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::campaign::model::{
    Campaign, CampaignStatus, DEFAULT_SEND_TIME, DEFAULT_WEEKLY_DAY, Frequency, Schedule,
};
use crate::campaign::store::CampaignStore;
use crate::error::{CampaignError, Error, QueueError, Result, SchedulingError};
use crate::queue::{JobHandler, JobQueue, JobRequest, JobState, QueuedJob, RetryPolicy};

/// Job type tag for campaign send jobs.
pub const CAMPAIGN_JOB_TYPE: &str = "campaign_send";

// ── Recurrence derivation ───────────────────────────────────────────

/// Derive a cron expression (seconds-resolution, as the queue expects) from
/// a schedule's frequency descriptor.
///
/// Defaults are fixed constants, not varying behavior: a schedule without a
/// send time fires at `DEFAULT_SEND_TIME`; a weekly schedule without
/// weekdays fires on `DEFAULT_WEEKLY_DAY`.
pub fn derive_recurrence(schedule: &Schedule) -> std::result::Result<String, SchedulingError> {
    let frequency = schedule.frequency.as_ref().ok_or_else(|| {
        SchedulingError::InvalidFrequency("schedule has no frequency descriptor".into())
    })?;

    let send_time = schedule.send_time.unwrap_or(DEFAULT_SEND_TIME);
    let (hour, minute) = (
        chrono::Timelike::hour(&send_time),
        chrono::Timelike::minute(&send_time),
    );

    let expression = match frequency {
        Frequency::Daily => format!("0 {minute} {hour} * * *"),
        Frequency::Weekly { weekdays } => {
            let days: Vec<String> = if weekdays.is_empty() {
                vec![DEFAULT_WEEKLY_DAY.to_string()]
            } else {
                weekdays.iter().map(|d| d.to_string()).collect()
            };
            format!("0 {minute} {hour} * * {}", days.join(","))
        }
        Frequency::Monthly { day_of_month } => {
            if !(1..=31).contains(day_of_month) {
                return Err(SchedulingError::InvalidFrequency(format!(
                    "day_of_month {day_of_month} out of range 1-31"
                )));
            }
            format!("0 {minute} {hour} {day_of_month} * *")
        }
        Frequency::Custom { expression } => expression.clone(),
    };

    // Validate the derived (or verbatim custom) expression up front so a
    // malformed descriptor fails the scheduling operation, not the queue.
    use std::str::FromStr;
    cron::Schedule::from_str(&expression).map_err(|e| SchedulingError::InvalidExpression {
        expression: expression.clone(),
        reason: e.to_string(),
    })?;

    Ok(expression)
}

// ── Execution callback ──────────────────────────────────────────────

/// Opaque campaign execution collaborator: performs the actual send and
/// metric updates when a job fires.
#[async_trait::async_trait]
pub trait CampaignRunner: Send + Sync {
    async fn execute(&self, campaign: &Campaign) -> std::result::Result<(), String>;
}

/// Glue between the job queue and the campaign store: activates a campaign
/// on its first firing and invokes the runner.
pub struct CampaignExecution {
    store: Arc<CampaignStore>,
    runner: Arc<dyn CampaignRunner>,
}

impl CampaignExecution {
    pub fn new(store: Arc<CampaignStore>, runner: Arc<dyn CampaignRunner>) -> Arc<Self> {
        Arc::new(Self { store, runner })
    }

    /// Fire one execution for a campaign.
    pub async fn fire(&self, campaign_id: Uuid) -> std::result::Result<(), String> {
        let campaign = self
            .store
            .get(campaign_id)
            .await
            .map_err(|e| e.to_string())?;

        match campaign.status {
            CampaignStatus::Scheduled => {
                self.store
                    .transition(campaign_id, CampaignStatus::Active, "activate")
                    .await
                    .map_err(|e| e.to_string())?;
            }
            CampaignStatus::Active => {}
            other => {
                // A job may fire in the window between a status change and
                // job removal; skip rather than resurrect the campaign.
                debug!(campaign_id = %campaign_id, status = %other, "Skipping fire");
                return Ok(());
            }
        }

        let campaign = self
            .store
            .get(campaign_id)
            .await
            .map_err(|e| e.to_string())?;
        self.runner.execute(&campaign).await?;

        self.store
            .record_run(campaign_id)
            .await
            .map_err(|e| e.to_string())?;
        info!(campaign_id = %campaign_id, "Campaign executed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobHandler for CampaignExecution {
    async fn handle(
        &self,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> std::result::Result<(), String> {
        if job_type != CAMPAIGN_JOB_TYPE {
            return Err(format!("unknown job type: {job_type}"));
        }
        let campaign_id = payload
            .get("campaign_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or("payload missing campaign_id")?;
        self.fire(campaign_id).await
    }
}

// ── Scheduler ───────────────────────────────────────────────────────

/// Outcome of a `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A job was submitted to the queue.
    Queued(Uuid),
    /// The start date was already past; the campaign ran immediately
    /// instead of being queued.
    ExecutedImmediately,
}

/// Translates campaign schedules into queue submissions and keeps queued
/// jobs consistent with pause/resume/delete.
pub struct CampaignScheduler {
    store: Arc<CampaignStore>,
    queue: Arc<dyn JobQueue>,
    execution: Arc<CampaignExecution>,
}

impl CampaignScheduler {
    pub fn new(
        store: Arc<CampaignStore>,
        queue: Arc<dyn JobQueue>,
        execution: Arc<CampaignExecution>,
    ) -> Self {
        Self {
            store,
            queue,
            execution,
        }
    }

    fn retry_policy(campaign: &Campaign) -> RetryPolicy {
        RetryPolicy::new(
            campaign.delivery.max_attempts,
            Duration::from_secs(campaign.delivery.backoff_base_secs),
        )
    }

    fn payload(campaign_id: Uuid) -> serde_json::Value {
        serde_json::json!({ "campaign_id": campaign_id.to_string() })
    }

    /// Schedule a draft campaign: attach the given schedule, transition to
    /// `scheduled`, and submit jobs (or execute immediately when the start
    /// date is already past).
    pub async fn schedule(&self, campaign_id: Uuid, schedule: Schedule) -> Result<ScheduleOutcome> {
        let campaign = self.store.get(campaign_id).await?;

        // Validate the recurrence before any state changes so a malformed
        // descriptor leaves the campaign untouched.
        if schedule.frequency.is_some() {
            derive_recurrence(&schedule)?;
        }

        self.store
            .update_schedule(campaign_id, schedule.clone())
            .await?;
        self.store
            .transition(campaign_id, CampaignStatus::Scheduled, "schedule")
            .await?;

        match self.submit_jobs(&campaign, &schedule).await? {
            Some(job_id) => Ok(ScheduleOutcome::Queued(job_id)),
            None => {
                // Missed-schedule recovery: run now instead of queuing.
                info!(campaign_id = %campaign_id, "Start date in the past; executing immediately");
                self.execution
                    .fire(campaign_id)
                    .await
                    .map_err(|e| Error::Scheduling(SchedulingError::ExecutionFailed(e)))?;
                Ok(ScheduleOutcome::ExecutedImmediately)
            }
        }
    }

    /// Pause an active campaign: remove its queued jobs, then mark paused.
    pub async fn pause(&self, campaign_id: Uuid) -> Result<()> {
        self.store
            .transition(campaign_id, CampaignStatus::Paused, "pause")
            .await?;

        let removed = self.remove_campaign_jobs(campaign_id).await?;
        info!(campaign_id = %campaign_id, removed, "Campaign paused");
        Ok(())
    }

    /// Resume a paused campaign: re-derive jobs from the stored schedule
    /// and mark active. Fails with `InvalidState` for any other status.
    pub async fn resume(&self, campaign_id: Uuid) -> Result<Option<Uuid>> {
        let campaign = self.store.get(campaign_id).await?;
        let schedule = campaign
            .schedule
            .clone()
            .ok_or(CampaignError::MissingSchedule { id: campaign_id })?;

        self.store
            .transition(campaign_id, CampaignStatus::Active, "resume")
            .await?;

        let job_id = self.submit_jobs(&campaign, &schedule).await?;
        info!(
            campaign_id = %campaign_id,
            resubmitted = job_id.is_some(),
            "Campaign resumed"
        );
        Ok(job_id)
    }

    /// Delete a campaign: cancel every referencing job first, then cancel
    /// the campaign and drop it from the store.
    pub async fn delete(&self, campaign_id: Uuid) -> Result<()> {
        let campaign = self.store.get(campaign_id).await?;

        let removed = self.remove_campaign_jobs(campaign_id).await?;
        if !campaign.status.is_terminal() {
            self.store
                .transition(campaign_id, CampaignStatus::Cancelled, "delete")
                .await?;
        }
        self.store.remove(campaign_id).await?;

        info!(campaign_id = %campaign_id, removed, "Campaign deleted");
        Ok(())
    }

    /// Queued/delayed jobs whose payload references this campaign.
    pub async fn jobs_for(&self, campaign_id: Uuid) -> Result<Vec<QueuedJob>> {
        let id = campaign_id.to_string();
        let jobs = self
            .queue
            .list_jobs(&[JobState::Delayed, JobState::Active])
            .await
            .map_err(Error::Queue)?;
        Ok(jobs
            .into_iter()
            .filter(|j| j.payload.get("campaign_id").and_then(|v| v.as_str()) == Some(id.as_str()))
            .collect())
    }

    /// Submit the job(s) a schedule calls for. Returns `None` when there is
    /// nothing left to submit (a one-time schedule whose start has passed —
    /// the immediate-execution path is `schedule`'s concern).
    async fn submit_jobs(
        &self,
        campaign: &Campaign,
        schedule: &Schedule,
    ) -> Result<Option<Uuid>> {
        let retry = Self::retry_policy(campaign);

        let request = match &schedule.frequency {
            None => {
                let delay = (schedule.start_at - Utc::now()).to_std().unwrap_or_default();
                if delay.is_zero() {
                    debug!(
                        campaign_id = %campaign.id,
                        "One-time start already past; nothing to submit"
                    );
                    return Ok(None);
                }
                JobRequest::once(CAMPAIGN_JOB_TYPE, Self::payload(campaign.id), delay, retry)
            }
            Some(_) => {
                let expression = derive_recurrence(schedule)?;
                JobRequest::repeating(
                    CAMPAIGN_JOB_TYPE,
                    Self::payload(campaign.id),
                    expression,
                    schedule.timezone.clone(),
                    Some(schedule.start_at),
                    schedule.end_at,
                    retry,
                )
            }
        };

        let job_id = self.queue.submit(request).await.map_err(Error::Queue)?;
        debug!(campaign_id = %campaign.id, job_id = %job_id, "Campaign job submitted");
        Ok(Some(job_id))
    }

    async fn remove_campaign_jobs(&self, campaign_id: Uuid) -> Result<usize> {
        let jobs = self.jobs_for(campaign_id).await?;
        let mut removed = 0;
        for job in jobs {
            match self.queue.remove_job(job.id).await {
                Ok(()) => removed += 1,
                // Lost a race with the job finishing; already gone.
                Err(QueueError::JobNotFound { .. }) => {}
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to remove campaign job");
                    return Err(Error::Queue(e));
                }
            }
        }
        Ok(removed)
    }
}

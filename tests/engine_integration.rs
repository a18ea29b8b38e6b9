//! End-to-end tests: built-in units through the pipeline, and the full
//! campaign lifecycle over the in-memory queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use mailflow::agents::builtin::standard_units;
use mailflow::agents::{AgentDescriptor, AgentKind, AgentRegistry, AgentUnit};
use mailflow::campaign::{
    Campaign, CampaignExecution, CampaignKind, CampaignRunner, CampaignScheduler, CampaignStatus,
    CampaignStore, Draft, DraftStore, Frequency, RecipientProfile, Schedule,
};
use mailflow::error::AgentError;
use mailflow::message::{EmailMessage, MessageCategory, MessagePatch, MessagePriority};
use mailflow::persist::Persistence;
use mailflow::pipeline::{AgentTask, PipelineExecutor, TaskLedger, TaskStatus};
use mailflow::queue::InMemoryJobQueue;

// ── Helpers ─────────────────────────────────────────────────────────

/// Persistence mock that records every write.
#[derive(Default)]
struct RecordingPersistence {
    tasks: Mutex<Vec<AgentTask>>,
    campaigns: Mutex<Vec<Campaign>>,
    drafts: Mutex<Vec<Draft>>,
}

#[async_trait]
impl Persistence for RecordingPersistence {
    async fn save_agent_task(&self, task: &AgentTask) -> Result<(), mailflow::error::StorageError> {
        self.tasks.lock().await.push(task.clone());
        Ok(())
    }

    async fn agent_tasks_for_unit(
        &self,
        unit_id: &str,
    ) -> Result<Vec<AgentTask>, mailflow::error::StorageError> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.unit_id == unit_id)
            .cloned()
            .collect())
    }

    async fn save_campaign(
        &self,
        campaign: &Campaign,
    ) -> Result<(), mailflow::error::StorageError> {
        self.campaigns.lock().await.push(campaign.clone());
        Ok(())
    }

    async fn delete_campaign(&self, _id: Uuid) -> Result<(), mailflow::error::StorageError> {
        Ok(())
    }

    async fn load_campaigns(&self) -> Result<Vec<Campaign>, mailflow::error::StorageError> {
        Ok(Vec::new())
    }

    async fn save_draft(&self, draft: &Draft) -> Result<(), mailflow::error::StorageError> {
        self.drafts.lock().await.push(draft.clone());
        Ok(())
    }

    async fn load_drafts(&self) -> Result<Vec<Draft>, mailflow::error::StorageError> {
        Ok(Vec::new())
    }
}

struct CountingRunner {
    runs: AtomicU32,
}

impl CountingRunner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicU32::new(0),
        })
    }

    fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CampaignRunner for CountingRunner {
    async fn execute(&self, _campaign: &Campaign) -> Result<(), String> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct BrokenResponder {
    descriptor: AgentDescriptor,
}

#[async_trait]
impl AgentUnit for BrokenResponder {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, _message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        Err(AgentError::Processing {
            unit: self.descriptor.id.clone(),
            reason: "responder backend offline".into(),
        })
    }
}

async fn standard_pipeline() -> (Arc<AgentRegistry>, PipelineExecutor, Arc<RecordingPersistence>) {
    let registry = Arc::new(AgentRegistry::new());
    for unit in standard_units() {
        registry.register(unit).await.unwrap();
    }
    let persistence = Arc::new(RecordingPersistence::default());
    let ledger = Arc::new(TaskLedger::with_persistence(persistence.clone()));
    let executor = PipelineExecutor::new(registry.clone(), ledger);
    (registry, executor, persistence)
}

// ── Pipeline end-to-end ─────────────────────────────────────────────

#[tokio::test]
async fn newsletter_flows_through_all_builtin_units() {
    let (_registry, executor, persistence) = standard_pipeline().await;

    let message = EmailMessage::inbound(
        "noreply@deals.example",
        vec!["me@corp.com".into()],
        "Weekly deals inside",
        "Big savings this week. Click here to unsubscribe at any time.",
    );
    let message_id = message.id;

    let report = executor.run(message).await.unwrap();

    // Filter categorized it, prioritizer downranked it, summarizer annotated it.
    assert_eq!(report.message.category, MessageCategory::Newsletters);
    assert_eq!(report.message.priority, MessagePriority::Low);
    assert!(report.message.has_label("bulk"));
    assert!(report.message.analysis.as_ref().unwrap().summary.is_some());

    // One ledger entry per unit, all completed, all written through.
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);
    let tasks = executor.ledger().tasks_for_message(message_id).await;
    assert_eq!(tasks.len(), 5);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert!(!persistence.tasks.lock().await.is_empty());
}

#[tokio::test]
async fn urgent_question_is_prioritized_and_summarized() {
    let (_registry, executor, _persistence) = standard_pipeline().await;

    let report = executor
        .run(EmailMessage::inbound(
            "cfo@corp.com",
            vec!["me@corp.com".into()],
            "Urgent: budget sign-off needed",
            "Can you approve the revised budget by end of day? The board meets tomorrow.",
        ))
        .await
        .unwrap();

    assert!(report.message.priority >= MessagePriority::High);
    let analysis = report.message.analysis.unwrap();
    assert!(analysis.urgency_score.unwrap() > 0.5);
    assert!(analysis.summary.unwrap().contains("budget"));
}

#[tokio::test]
async fn failing_unit_never_blocks_the_rest() {
    let (registry, executor, _persistence) = standard_pipeline().await;
    registry
        .register(Arc::new(BrokenResponder {
            descriptor: AgentDescriptor::new("responder-1", "Auto responder", AgentKind::Responder),
        }))
        .await
        .unwrap();

    let report = executor
        .run(EmailMessage::inbound(
            "alice@company.com",
            vec!["me@corp.com".into()],
            "Lunch",
            "Are you free tomorrow?",
        ))
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 5);

    let outcome = &report.outcomes["responder-1"];
    assert!(!outcome.success);
    let task = executor.ledger().get(outcome.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("responder backend offline"));

    // The summarizer (rank 5, before responder at rank 6) and the rest of
    // the chain still contributed.
    assert!(report.message.analysis.is_some());
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let (_registry, executor, _persistence) = standard_pipeline().await;
    let executor = Arc::new(executor);

    let spam = EmailMessage::inbound(
        "promo@deals.example",
        vec![],
        "You have won",
        "You have won! Claim your prize now.",
    );
    let personal = EmailMessage::inbound(
        "alice@company.com",
        vec![],
        "Plan",
        "Does Thursday work for the review?",
    );

    let (a, b) = tokio::join!(executor.run(spam), executor.run(personal));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.message.category, MessageCategory::Spam);
    assert_eq!(a.message.priority, MessagePriority::Low);
    assert_eq!(b.message.category, MessageCategory::Primary);
    assert_eq!(b.message.priority, MessagePriority::Normal);
}

// ── Campaign lifecycle ──────────────────────────────────────────────

fn campaign_stack() -> (
    Arc<CampaignStore>,
    Arc<CountingRunner>,
    CampaignScheduler,
) {
    let store = Arc::new(CampaignStore::new());
    let runner = CountingRunner::new();
    let execution = CampaignExecution::new(store.clone(), runner.clone());
    let queue = InMemoryJobQueue::new(execution.clone());
    let scheduler = CampaignScheduler::new(store.clone(), queue, execution);
    (store, runner, scheduler)
}

#[tokio::test(start_paused = true)]
async fn delayed_one_time_campaign_fires_and_activates() {
    let (store, runner, scheduler) = campaign_stack();
    let campaign = store
        .create("Launch", CampaignKind::OneTime, "ops@corp.com")
        .await;

    let schedule = Schedule::one_time(Utc::now() + chrono::Duration::seconds(30), "UTC");
    scheduler.schedule(campaign.id, schedule).await.unwrap();
    assert_eq!(runner.runs(), 0);

    tokio::time::sleep(Duration::from_secs(35)).await;

    assert_eq!(runner.runs(), 1);
    let campaign = store.get(campaign.id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Active);
    assert_eq!(campaign.metrics.runs, 1);
}

#[tokio::test]
async fn full_pause_resume_delete_cycle() {
    let (store, _runner, scheduler) = campaign_stack();
    let campaign = store
        .create("Weekly digest", CampaignKind::Recurring, "ops@corp.com")
        .await;

    let schedule = Schedule::recurring(
        Utc::now(),
        "America/New_York",
        Frequency::Weekly {
            weekdays: vec![chrono::Weekday::Mon, chrono::Weekday::Wed, chrono::Weekday::Fri],
        },
    );
    scheduler.schedule(campaign.id, schedule).await.unwrap();
    store
        .transition(campaign.id, CampaignStatus::Active, "activate")
        .await
        .unwrap();

    // Pause removes the repeat job.
    scheduler.pause(campaign.id).await.unwrap();
    assert!(scheduler.jobs_for(campaign.id).await.unwrap().is_empty());

    // Resume re-derives it from the stored schedule.
    scheduler.resume(campaign.id).await.unwrap();
    assert_eq!(scheduler.jobs_for(campaign.id).await.unwrap().len(), 1);

    // Resuming again is an invalid transition.
    assert!(scheduler.resume(campaign.id).await.is_err());

    // Delete leaves zero jobs referencing the campaign.
    scheduler.delete(campaign.id).await.unwrap();
    assert!(scheduler.jobs_for(campaign.id).await.unwrap().is_empty());
    assert!(store.get(campaign.id).await.is_err());
}

#[tokio::test]
async fn campaign_writes_through_to_persistence() {
    let persistence = Arc::new(RecordingPersistence::default());
    let store = Arc::new(CampaignStore::with_persistence(persistence.clone()));

    let campaign = store
        .create("Persisted", CampaignKind::OneTime, "ops@corp.com")
        .await;
    store
        .transition(campaign.id, CampaignStatus::Scheduled, "schedule")
        .await
        .unwrap();

    let saved = persistence.campaigns.lock().await;
    assert!(saved.len() >= 2);
    assert_eq!(saved.last().unwrap().status, CampaignStatus::Scheduled);
}

// ── Drafts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn campaign_drafts_are_decided_once() {
    let persistence = Arc::new(RecordingPersistence::default());
    let drafts = DraftStore::with_persistence(persistence.clone());
    let campaign_id = Uuid::new_v4();

    let created = drafts
        .create_bulk(
            campaign_id,
            vec![
                RecipientProfile {
                    address: "a@x.com".into(),
                    name: Some("Ada".into()),
                    metadata: serde_json::Map::new(),
                },
                RecipientProfile {
                    address: "b@x.com".into(),
                    name: None,
                    metadata: serde_json::Map::new(),
                },
            ],
            "Hello {name}",
            "Body",
        )
        .await;

    drafts.approve(created[0].id).await.unwrap();
    drafts.reject(created[1].id).await.unwrap();

    // Second decisions fail cleanly; status never moves backward.
    assert!(drafts.approve(created[0].id).await.is_err());
    assert!(drafts.approve(created[1].id).await.is_err());
    assert_eq!(
        drafts.get(created[0].id).await.unwrap().status,
        mailflow::campaign::DraftStatus::Approved
    );
    assert!(!persistence.drafts.lock().await.is_empty());
}

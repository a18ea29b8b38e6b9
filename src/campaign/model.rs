//! Campaign data model and status state machine.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RetryConfig;

/// Send time used when a recurring schedule omits an explicit one.
pub const DEFAULT_SEND_TIME: NaiveTime = match NaiveTime::from_hms_opt(9, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};

/// Weekday used when a weekly schedule omits explicit weekdays.
pub const DEFAULT_WEEKLY_DAY: Weekday = Weekday::Mon;

// ── Status ──────────────────────────────────────────────────────────

/// Status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    /// Check if this status allows transitioning to another status.
    ///
    /// This table is the single authority on campaign lifecycle; no code
    /// path outside `CampaignStore::transition` sets status.
    pub fn can_transition_to(&self, target: CampaignStatus) -> bool {
        use CampaignStatus::*;

        matches!(
            (self, target),
            (Draft, Scheduled) | (Draft, Cancelled) |
            // Scheduled campaigns go live on the first firing
            (Scheduled, Active) | (Scheduled, Cancelled) |
            // Active campaigns can pause, finish, or be cancelled
            (Active, Paused) | (Active, Completed) | (Active, Cancelled) |
            // Paused campaigns resume or are cancelled
            (Paused, Active) | (Paused, Cancelled)
        )
    }

    /// Completed and cancelled campaigns are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Kind of campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    OneTime,
    Recurring,
    Drip,
    Triggered,
    AbTest,
}

/// Approval state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

// ── Schedule ────────────────────────────────────────────────────────

/// How often a recurring campaign fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frequency {
    /// Once per day at the schedule's send time.
    Daily,
    /// On the given weekdays. Empty defaults to `DEFAULT_WEEKLY_DAY`.
    Weekly { weekdays: Vec<Weekday> },
    /// On the given day of the month (1-31).
    Monthly { day_of_month: u32 },
    /// Caller-supplied cron expression, used verbatim.
    Custom { expression: String },
}

/// Declarative send schedule. Immutable snapshot on the campaign —
/// replacing it requires re-deriving and resubmitting jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    /// IANA timezone name. Carried to the job queue, which owns local-time
    /// resolution.
    pub timezone: String,
    /// Fixed time-of-day; `DEFAULT_SEND_TIME` when absent.
    pub send_time: Option<NaiveTime>,
    /// Absent for one-time sends.
    pub frequency: Option<Frequency>,
    pub batch_size: Option<u32>,
    /// Max sends per minute.
    pub throttle_rate: Option<u32>,
}

impl Schedule {
    /// One-shot schedule at a fixed instant.
    pub fn one_time(start_at: DateTime<Utc>, timezone: impl Into<String>) -> Self {
        Self {
            start_at,
            end_at: None,
            timezone: timezone.into(),
            send_time: None,
            frequency: None,
            batch_size: None,
            throttle_rate: None,
        }
    }

    /// Recurring schedule starting at a fixed instant.
    pub fn recurring(
        start_at: DateTime<Utc>,
        timezone: impl Into<String>,
        frequency: Frequency,
    ) -> Self {
        Self {
            start_at,
            end_at: None,
            timezone: timezone.into(),
            send_time: None,
            frequency: Some(frequency),
            batch_size: None,
            throttle_rate: None,
        }
    }

    pub fn with_send_time(mut self, send_time: NaiveTime) -> Self {
        self.send_time = Some(send_time);
        self
    }

    pub fn with_end(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }
}

// ── Audience, content, delivery ─────────────────────────────────────

/// Who a campaign targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetAudience {
    pub segments: Vec<String>,
    pub exclude_segments: Vec<String>,
    pub estimated_size: Option<u64>,
}

/// What a campaign sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub subject_template: String,
    pub body_template: String,
    /// Placeholder fields filled per recipient.
    pub personalization_fields: Vec<String>,
}

/// How a campaign is delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Delivery provider name (opaque to the core).
    pub provider: String,
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts, in seconds.
    pub backoff_base_secs: u64,
    pub handle_bounces: bool,
    pub handle_unsubscribes: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            provider: "default".to_string(),
            max_attempts: retry.max_attempts,
            backoff_base_secs: retry.backoff_base.as_secs(),
            handle_bounces: true,
            handle_unsubscribes: true,
        }
    }
}

/// Delivery counters accumulated over a campaign's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub unsubscribed: u64,
    pub runs: u64,
}

// ── Campaign ────────────────────────────────────────────────────────

/// A configured, schedulable batch of outbound messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub kind: CampaignKind,
    pub audience: TargetAudience,
    /// Attached at schedule time; immutable snapshot.
    pub schedule: Option<Schedule>,
    pub content: ContentDescriptor,
    pub delivery: DeliveryConfig,
    pub metrics: CampaignMetrics,
    pub approval: ApprovalState,
    pub owner: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a campaign in `draft` status.
    pub fn new(name: impl Into<String>, kind: CampaignKind, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: CampaignStatus::Draft,
            kind,
            audience: TargetAudience::default(),
            schedule: None,
            content: ContentDescriptor::default(),
            delivery: DeliveryConfig::default(),
            metrics: CampaignMetrics::default(),
            approval: ApprovalState::Pending,
            owner: owner.into(),
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

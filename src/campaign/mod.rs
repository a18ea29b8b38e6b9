//! Campaign lifecycle: model, store, drafts, and scheduler.
//!
//! Status changes go through `CampaignStore::transition` exclusively; the
//! scheduler keeps queued jobs consistent with every transition it drives.

pub mod draft;
pub mod model;
pub mod scheduler;
pub mod store;

pub use draft::{Draft, DraftStatus, DraftStore, RecipientProfile};
pub use model::{
    ApprovalState, Campaign, CampaignKind, CampaignMetrics, CampaignStatus, ContentDescriptor,
    DEFAULT_SEND_TIME, DEFAULT_WEEKLY_DAY, DeliveryConfig, Frequency, Schedule, TargetAudience,
};
pub use scheduler::{
    CAMPAIGN_JOB_TYPE, CampaignExecution, CampaignRunner, CampaignScheduler, ScheduleOutcome,
    derive_recurrence,
};
pub use store::CampaignStore;

//! Drafts — generated, approvable message instances.
//!
//! A draft can be approved or rejected exactly once, and only while it is
//! still in a draft-like status. Deciding an already-decided draft surfaces
//! an error to the caller; status never moves backward from a decision.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DraftError;
use crate::persist::Persistence;

// ── Model ───────────────────────────────────────────────────────────

/// Status of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Sent,
}

impl DraftStatus {
    /// Draft-like statuses are the only ones an approval decision may leave.
    pub fn is_decidable(&self) -> bool {
        matches!(self, Self::Draft | Self::PendingApproval)
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
        };
        write!(f, "{s}")
    }
}

/// Recipient a draft is addressed to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientProfile {
    pub address: String,
    pub name: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A single generated, approvable message instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    /// Owning campaign, if the draft was generated for one.
    pub campaign_id: Option<Uuid>,
    pub status: DraftStatus,
    pub recipient: RecipientProfile,
    pub subject: String,
    pub body: String,
    pub ai_generated: bool,
    /// Generation quality score in [0.0, 1.0], when AI-generated.
    pub ai_score: Option<f32>,
    /// Per-recipient placeholder values.
    pub personalization: HashMap<String, String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub predicted_engagement: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(
        recipient: RecipientProfile,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id: None,
            status: DraftStatus::Draft,
            recipient,
            subject: subject.into(),
            body: body.into(),
            ai_generated: false,
            ai_score: None,
            personalization: HashMap::new(),
            scheduled_at: None,
            sent_at: None,
            predicted_engagement: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_campaign(mut self, campaign_id: Uuid) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn ai_generated(mut self, score: f32) -> Self {
        self.ai_generated = true;
        self.ai_score = Some(score.clamp(0.0, 1.0));
        self
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// In-memory draft store with write-through.
pub struct DraftStore {
    drafts: RwLock<HashMap<Uuid, Draft>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self {
            drafts: RwLock::new(HashMap::new()),
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            drafts: RwLock::new(HashMap::new()),
            persistence: Some(persistence),
        }
    }

    async fn write_through(&self, draft: &Draft) {
        if let Some(ref persistence) = self.persistence
            && let Err(e) = persistence.save_draft(draft).await
        {
            warn!(draft_id = %draft.id, error = %e, "Draft write-through failed");
        }
    }

    pub async fn insert(&self, draft: Draft) -> Draft {
        self.write_through(&draft).await;
        self.drafts.write().await.insert(draft.id, draft.clone());
        draft
    }

    /// Create one draft per recipient for a campaign.
    pub async fn create_bulk(
        &self,
        campaign_id: Uuid,
        recipients: Vec<RecipientProfile>,
        subject: &str,
        body: &str,
    ) -> Vec<Draft> {
        let created = futures::future::join_all(recipients.into_iter().map(|recipient| {
            self.insert(Draft::new(recipient, subject, body).for_campaign(campaign_id))
        }))
        .await;
        info!(
            campaign_id = %campaign_id,
            count = created.len(),
            "Bulk drafts created"
        );
        created
    }

    pub async fn get(&self, id: Uuid) -> Result<Draft, DraftError> {
        self.drafts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DraftError::NotFound { id })
    }

    pub async fn for_campaign(&self, campaign_id: Uuid) -> Vec<Draft> {
        self.drafts
            .read()
            .await
            .values()
            .filter(|d| d.campaign_id == Some(campaign_id))
            .cloned()
            .collect()
    }

    /// Approve a draft. Fails if it has already been decided.
    pub async fn approve(&self, id: Uuid) -> Result<Draft, DraftError> {
        self.decide(id, DraftStatus::Approved).await
    }

    /// Reject a draft. Fails if it has already been decided.
    pub async fn reject(&self, id: Uuid) -> Result<Draft, DraftError> {
        self.decide(id, DraftStatus::Rejected).await
    }

    /// Mark an approved draft as sent.
    pub async fn mark_sent(&self, id: Uuid) -> Result<Draft, DraftError> {
        let mut drafts = self.drafts.write().await;
        let draft = drafts.get_mut(&id).ok_or(DraftError::NotFound { id })?;

        if draft.status != DraftStatus::Approved {
            return Err(DraftError::AlreadyDecided {
                id,
                status: draft.status.to_string(),
            });
        }
        draft.status = DraftStatus::Sent;
        draft.sent_at = Some(Utc::now());
        draft.updated_at = Utc::now();
        let updated = draft.clone();
        drop(drafts);

        self.write_through(&updated).await;
        Ok(updated)
    }

    async fn decide(&self, id: Uuid, target: DraftStatus) -> Result<Draft, DraftError> {
        let mut drafts = self.drafts.write().await;
        let draft = drafts.get_mut(&id).ok_or(DraftError::NotFound { id })?;

        if !draft.status.is_decidable() {
            return Err(DraftError::AlreadyDecided {
                id,
                status: draft.status.to_string(),
            });
        }

        draft.status = target;
        draft.updated_at = Utc::now();
        let updated = draft.clone();
        drop(drafts);

        info!(draft_id = %id, status = %target, "Draft decided");
        self.write_through(&updated).await;
        Ok(updated)
    }
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(address: &str) -> RecipientProfile {
        RecipientProfile {
            address: address.to_string(),
            name: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn approve_once_then_error() {
        let store = DraftStore::new();
        let draft = store
            .insert(Draft::new(recipient("a@x.com"), "Hi", "Body"))
            .await;

        let approved = store.approve(draft.id).await.unwrap();
        assert_eq!(approved.status, DraftStatus::Approved);

        // Second decision fails cleanly and never moves status backward.
        let err = store.approve(draft.id).await.unwrap_err();
        assert!(matches!(err, DraftError::AlreadyDecided { .. }));
        let err = store.reject(draft.id).await.unwrap_err();
        assert!(matches!(err, DraftError::AlreadyDecided { .. }));

        assert_eq!(store.get(draft.id).await.unwrap().status, DraftStatus::Approved);
    }

    #[tokio::test]
    async fn pending_approval_is_decidable() {
        let store = DraftStore::new();
        let mut draft = Draft::new(recipient("a@x.com"), "Hi", "Body");
        draft.status = DraftStatus::PendingApproval;
        let draft = store.insert(draft).await;

        let rejected = store.reject(draft.id).await.unwrap();
        assert_eq!(rejected.status, DraftStatus::Rejected);
    }

    #[tokio::test]
    async fn sent_requires_approval() {
        let store = DraftStore::new();
        let draft = store
            .insert(Draft::new(recipient("a@x.com"), "Hi", "Body"))
            .await;

        assert!(store.mark_sent(draft.id).await.is_err());
        store.approve(draft.id).await.unwrap();
        let sent = store.mark_sent(draft.id).await.unwrap();
        assert_eq!(sent.status, DraftStatus::Sent);
        assert!(sent.sent_at.is_some());
    }

    #[tokio::test]
    async fn bulk_create_links_campaign() {
        let store = DraftStore::new();
        let campaign_id = Uuid::new_v4();
        let created = store
            .create_bulk(
                campaign_id,
                vec![recipient("a@x.com"), recipient("b@x.com")],
                "Subject",
                "Body",
            )
            .await;

        assert_eq!(created.len(), 2);
        assert_eq!(store.for_campaign(campaign_id).await.len(), 2);
        assert!(created.iter().all(|d| d.campaign_id == Some(campaign_id)));
    }

    #[tokio::test]
    async fn unknown_draft_errors() {
        let store = DraftStore::new();
        let err = store.approve(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DraftError::NotFound { .. }));
    }
}

//! Campaign store — in-memory authoritative cache with write-through.
//!
//! The store owns concurrency discipline for campaign records: every
//! mutation happens under its write lock, and `transition` is the only path
//! that changes a campaign's status. A rejected transition leaves the record
//! untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::campaign::model::{
    ApprovalState, Campaign, CampaignKind, CampaignMetrics, CampaignStatus, ContentDescriptor,
    Schedule,
};
use crate::error::CampaignError;
use crate::persist::Persistence;

/// In-memory campaign store backed by an optional persistence collaborator.
pub struct CampaignStore {
    campaigns: RwLock<HashMap<Uuid, Campaign>>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: RwLock::new(HashMap::new()),
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            campaigns: RwLock::new(HashMap::new()),
            persistence: Some(persistence),
        }
    }

    /// Load previously persisted campaigns into the cache (startup recovery).
    pub async fn hydrate(&self) -> Result<usize, crate::error::StorageError> {
        let Some(ref persistence) = self.persistence else {
            return Ok(0);
        };
        let loaded = persistence.load_campaigns().await?;
        let count = loaded.len();
        let mut campaigns = self.campaigns.write().await;
        for campaign in loaded {
            campaigns.insert(campaign.id, campaign);
        }
        info!(count, "Hydrated campaign store");
        Ok(count)
    }

    async fn write_through(&self, campaign: &Campaign) {
        if let Some(ref persistence) = self.persistence
            && let Err(e) = persistence.save_campaign(campaign).await
        {
            warn!(campaign_id = %campaign.id, error = %e, "Campaign write-through failed");
        }
    }

    /// Create a campaign in `draft` status.
    pub async fn create(
        &self,
        name: impl Into<String>,
        kind: CampaignKind,
        owner: impl Into<String>,
    ) -> Campaign {
        let campaign = Campaign::new(name, kind, owner);
        info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        self.campaigns
            .write()
            .await
            .insert(campaign.id, campaign.clone());
        self.write_through(&campaign).await;
        campaign
    }

    /// Insert an externally built campaign (tests, imports).
    pub async fn insert(&self, campaign: Campaign) {
        self.write_through(&campaign).await;
        self.campaigns
            .write()
            .await
            .insert(campaign.id, campaign);
    }

    pub async fn get(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        self.campaigns
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CampaignError::NotFound { id })
    }

    pub async fn list(&self) -> Vec<Campaign> {
        self.campaigns.read().await.values().cloned().collect()
    }

    /// Transition a campaign's status. The only status mutation path.
    ///
    /// `action` names the operation for the error message ("pause",
    /// "resume", ...). On an illegal transition the campaign keeps its
    /// prior state and `InvalidState` is returned.
    pub async fn transition(
        &self,
        id: Uuid,
        target: CampaignStatus,
        action: &str,
    ) -> Result<Campaign, CampaignError> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(CampaignError::NotFound { id })?;

        if !campaign.status.can_transition_to(target) {
            return Err(CampaignError::InvalidState {
                id,
                status: campaign.status,
                action: action.to_string(),
            });
        }

        debug!(
            campaign_id = %id,
            from = %campaign.status,
            to = %target,
            action,
            "Campaign status transition"
        );
        campaign.status = target;
        campaign.updated_at = Utc::now();
        let updated = campaign.clone();
        drop(campaigns);

        self.write_through(&updated).await;
        Ok(updated)
    }

    /// Attach or replace the schedule snapshot. Does not touch status;
    /// the scheduler re-derives jobs separately.
    pub async fn update_schedule(
        &self,
        id: Uuid,
        schedule: Schedule,
    ) -> Result<Campaign, CampaignError> {
        self.update_with(id, |campaign| {
            campaign.schedule = Some(schedule);
        })
        .await
    }

    pub async fn update_content(
        &self,
        id: Uuid,
        content: ContentDescriptor,
    ) -> Result<Campaign, CampaignError> {
        self.update_with(id, |campaign| {
            campaign.content = content;
        })
        .await
    }

    pub async fn set_approval(
        &self,
        id: Uuid,
        approval: ApprovalState,
    ) -> Result<Campaign, CampaignError> {
        self.update_with(id, |campaign| {
            campaign.approval = approval;
        })
        .await
    }

    /// Record one execution run.
    pub async fn record_run(&self, id: Uuid) -> Result<Campaign, CampaignError> {
        self.update_with(id, |campaign| {
            campaign.metrics.runs += 1;
            campaign.last_run_at = Some(Utc::now());
        })
        .await
    }

    /// Fold delivery counters into the campaign's metrics accumulator.
    pub async fn apply_metrics(
        &self,
        id: Uuid,
        delta: CampaignMetrics,
    ) -> Result<Campaign, CampaignError> {
        self.update_with(id, |campaign| {
            let m = &mut campaign.metrics;
            m.sent += delta.sent;
            m.delivered += delta.delivered;
            m.opened += delta.opened;
            m.clicked += delta.clicked;
            m.bounced += delta.bounced;
            m.unsubscribed += delta.unsubscribed;
        })
        .await
    }

    /// Remove a campaign. Callers (the scheduler) must have cancelled its
    /// jobs first.
    pub async fn remove(&self, id: Uuid) -> Result<(), CampaignError> {
        self.campaigns
            .write()
            .await
            .remove(&id)
            .ok_or(CampaignError::NotFound { id })?;
        if let Some(ref persistence) = self.persistence
            && let Err(e) = persistence.delete_campaign(id).await
        {
            warn!(campaign_id = %id, error = %e, "Campaign delete write-through failed");
        }
        info!(campaign_id = %id, "Campaign removed");
        Ok(())
    }

    /// Mutate non-status fields under the write lock.
    async fn update_with<F>(&self, id: Uuid, mutate: F) -> Result<Campaign, CampaignError>
    where
        F: FnOnce(&mut Campaign),
    {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(CampaignError::NotFound { id })?;
        mutate(campaign);
        campaign.updated_at = Utc::now();
        let updated = campaign.clone();
        drop(campaigns);

        self.write_through(&updated).await;
        Ok(updated)
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_campaign_error_names_the_id() {
        let store = CampaignStore::new();
        let id = Uuid::new_v4();
        let err = store.get(id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Campaign {id} not found"));
    }

    #[tokio::test]
    async fn create_then_transition() {
        let store = CampaignStore::new();
        let campaign = store
            .create("Launch", CampaignKind::OneTime, "ops@corp.com")
            .await;

        let updated = store
            .transition(campaign.id, CampaignStatus::Scheduled, "schedule")
            .await
            .unwrap();
        assert_eq!(updated.status, CampaignStatus::Scheduled);
    }

    #[tokio::test]
    async fn illegal_transition_keeps_prior_state() {
        let store = CampaignStore::new();
        let campaign = store
            .create("Launch", CampaignKind::OneTime, "ops@corp.com")
            .await;

        let err = store
            .transition(campaign.id, CampaignStatus::Paused, "pause")
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidState { .. }));

        let current = store.get(campaign.id).await.unwrap();
        assert_eq!(current.status, CampaignStatus::Draft);
    }

    #[tokio::test]
    async fn metrics_accumulate() {
        let store = CampaignStore::new();
        let campaign = store
            .create("Launch", CampaignKind::Recurring, "ops@corp.com")
            .await;

        store
            .apply_metrics(
                campaign.id,
                CampaignMetrics {
                    sent: 100,
                    delivered: 95,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let updated = store
            .apply_metrics(
                campaign.id,
                CampaignMetrics {
                    sent: 50,
                    bounced: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.metrics.sent, 150);
        assert_eq!(updated.metrics.delivered, 95);
        assert_eq!(updated.metrics.bounced, 2);
    }

    #[tokio::test]
    async fn record_run_bumps_counter_and_timestamp() {
        let store = CampaignStore::new();
        let campaign = store
            .create("Launch", CampaignKind::Recurring, "ops@corp.com")
            .await;

        let updated = store.record_run(campaign.id).await.unwrap();
        assert_eq!(updated.metrics.runs, 1);
        assert!(updated.last_run_at.is_some());
    }

    #[tokio::test]
    async fn remove_unknown_errors() {
        let store = CampaignStore::new();
        assert!(store.remove(Uuid::new_v4()).await.is_err());
    }
}

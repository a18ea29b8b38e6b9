//! Agent registry — holds the set of active agent units and derives the
//! pipeline execution order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agents::unit::AgentUnit;
use crate::error::AgentError;

/// Registry of agent units keyed by their stable id.
pub struct AgentRegistry {
    units: RwLock<HashMap<String, Arc<dyn AgentUnit>>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
        }
    }

    /// Register a unit. Fails if the identity is already taken.
    pub async fn register(&self, unit: Arc<dyn AgentUnit>) -> Result<(), AgentError> {
        let id = unit.descriptor().id.clone();
        let mut units = self.units.write().await;
        if units.contains_key(&id) {
            return Err(AgentError::DuplicateUnit { id });
        }
        tracing::debug!(unit = %id, kind = %unit.descriptor().kind, "Registered agent unit");
        units.insert(id, unit);
        Ok(())
    }

    /// Unregister a unit and run its shutdown hook.
    pub async fn unregister(&self, id: &str) -> Result<(), AgentError> {
        let unit = self
            .units
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AgentError::UnitNotFound { id: id.to_string() })?;

        if let Err(e) = unit.shutdown().await {
            tracing::warn!(unit = %id, error = %e, "Agent unit shutdown reported an error");
        }
        tracing::debug!(unit = %id, "Unregistered agent unit");
        Ok(())
    }

    /// Look up a unit by id.
    pub async fn get(&self, id: &str) -> Option<Arc<dyn AgentUnit>> {
        self.units.read().await.get(id).cloned()
    }

    /// All enabled units, in no particular order.
    pub async fn list_active(&self) -> Vec<Arc<dyn AgentUnit>> {
        self.units
            .read()
            .await
            .values()
            .filter(|u| u.descriptor().enabled)
            .cloned()
            .collect()
    }

    /// Enabled units in pipeline execution order: kind rank first, then the
    /// descriptor's numeric priority (higher first) as a tie-break within an
    /// equal kind, then id for determinism.
    pub async fn execution_order(&self) -> Vec<Arc<dyn AgentUnit>> {
        let mut active = self.list_active().await;
        active.sort_by(|a, b| {
            let da = a.descriptor();
            let db = b.descriptor();
            da.kind
                .execution_rank()
                .cmp(&db.kind.execution_rank())
                .then(db.priority.cmp(&da.priority))
                .then(da.id.cmp(&db.id))
        });
        active
    }

    /// Number of registered units (enabled or not).
    pub async fn count(&self) -> usize {
        self.units.read().await.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

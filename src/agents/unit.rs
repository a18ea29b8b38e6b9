//! The agent unit capability interface.
//!
//! An agent unit is a self-contained, stateless-between-calls processing
//! capability applied to a message. Units propose modifications as a
//! `MessagePatch`; they never mutate shared state directly. There is no base
//! class — shared bookkeeping lives in the composable `UnitMetrics` helper.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::message::{EmailMessage, MessagePatch};

// ── Kind & ordering ─────────────────────────────────────────────────

/// Declared kind of an agent unit.
///
/// The kind drives pipeline ordering through a fixed rank table; the
/// descriptor's numeric `priority` never reorders across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Security,
    Filter,
    Categorizer,
    Prioritizer,
    Summarizer,
    Responder,
    Translator,
    Scheduler,
}

impl AgentKind {
    /// Fixed execution rank. Lower ranks run first.
    pub fn execution_rank(&self) -> u8 {
        match self {
            Self::Security => 1,
            Self::Filter => 2,
            Self::Categorizer => 3,
            Self::Prioritizer => 4,
            Self::Summarizer => 5,
            Self::Responder => 6,
            Self::Translator => 7,
            Self::Scheduler => 8,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Security => "security",
            Self::Filter => "filter",
            Self::Categorizer => "categorizer",
            Self::Prioritizer => "prioritizer",
            Self::Summarizer => "summarizer",
            Self::Responder => "responder",
            Self::Translator => "translator",
            Self::Scheduler => "scheduler",
        };
        write!(f, "{s}")
    }
}

// ── Descriptor ──────────────────────────────────────────────────────

/// Static description of an agent unit. Registered once at process start;
/// not mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable identity.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Declared kind; drives execution order.
    pub kind: AgentKind,
    /// Disabled units are skipped by the pipeline.
    pub enabled: bool,
    /// Numeric priority. Tie-break only, within an equal kind — the kind
    /// rank table is the primary ordering.
    pub priority: i32,
    /// Declared capabilities.
    pub capabilities: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            enabled: true,
            priority: 0,
            capabilities: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Runtime status reported by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Ready,
    Degraded,
    ShutDown,
}

// ── Capability trait ────────────────────────────────────────────────

/// A pluggable message-processing capability.
#[async_trait]
pub trait AgentUnit: Send + Sync {
    /// Static descriptor for this unit.
    fn descriptor(&self) -> &AgentDescriptor;

    /// One-time setup with unit-specific configuration.
    async fn initialize(&self, _config: &serde_json::Value) -> Result<(), AgentError> {
        Ok(())
    }

    /// Process a message and propose modifications.
    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError>;

    /// Release resources at unregistration.
    async fn shutdown(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Current runtime status.
    fn status(&self) -> UnitStatus {
        UnitStatus::Ready
    }
}

// ── Shared bookkeeping ──────────────────────────────────────────────

/// Composable per-unit counters. Units embed this instead of inheriting
/// from a common superclass.
#[derive(Debug, Default)]
pub struct UnitMetrics {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl UnitMetrics {
    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

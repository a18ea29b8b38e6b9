//! Priority scoring unit.
//!
//! Scores urgency from content signals and maps the score onto the message
//! priority scale. Bulk-labelled messages are deprioritized instead.

use async_trait::async_trait;
use regex::Regex;

use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics};
use crate::error::AgentError;
use crate::message::{EmailMessage, MessageCategory, MessagePatch, MessagePriority};

/// Urgency-signal prioritizer.
pub struct PrioritizerUnit {
    descriptor: AgentDescriptor,
    urgent_phrases: Regex,
    deadline_phrases: Regex,
    metrics: UnitMetrics,
}

impl PrioritizerUnit {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                "builtin-prioritizer",
                "Urgency prioritizer",
                AgentKind::Prioritizer,
            )
            .with_capabilities(vec!["prioritization".into(), "urgency-scoring".into()]),
            urgent_phrases: Regex::new(r"(?i)\b(urgent|asap|immediately|right away|emergency)\b")
                .unwrap(),
            deadline_phrases: Regex::new(
                r"(?i)(by (eod|end of day|tomorrow)|deadline|action required|time.sensitive)",
            )
            .unwrap(),
            metrics: UnitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }

    fn score(&self, message: &EmailMessage) -> f32 {
        let mut score: f32 = 0.0;
        let text = format!("{} {}", message.subject, message.body);

        if self.urgent_phrases.is_match(&text) {
            score += 0.5;
        }
        if self.deadline_phrases.is_match(&text) {
            score += 0.3;
        }
        if message.body.contains('?') {
            score += 0.1;
        }
        if message.is_starred {
            score += 0.2;
        }
        score.clamp(0.0, 1.0)
    }
}

impl Default for PrioritizerUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentUnit for PrioritizerUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        let mut patch = MessagePatch::default();

        // Bulk mail never gets bumped, whatever the wording claims.
        let bulk = matches!(
            message.category,
            MessageCategory::Spam | MessageCategory::Newsletters | MessageCategory::Promotions
        ) || message.has_label("bulk");

        if bulk {
            patch.priority = Some(MessagePriority::Low);
            patch.urgency_score = Some(0.0);
        } else {
            let score = self.score(message);
            patch.urgency_score = Some(score);
            patch.priority = Some(if score >= 0.7 {
                MessagePriority::Urgent
            } else if score >= 0.4 {
                MessagePriority::High
            } else {
                MessagePriority::Normal
            });
        }

        self.metrics.record_success();
        Ok(patch)
    }
}

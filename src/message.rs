//! The email message data model and the declared-modification patch type.
//!
//! Messages are created at the inbound/outbound boundary and mutated only by
//! the pipeline executor applying `MessagePatch`es proposed by agent units.
//! The core never deletes a message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Priority & category ─────────────────────────────────────────────

/// Message priority. Ordered: low < normal < high < urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

/// Closed set of message categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    #[default]
    Primary,
    Promotions,
    Newsletters,
    Transactional,
    Social,
    Spam,
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "primary",
            Self::Promotions => "promotions",
            Self::Newsletters => "newsletters",
            Self::Transactional => "transactional",
            Self::Social => "social",
            Self::Spam => "spam",
        };
        write!(f, "{s}")
    }
}

// ── Message ─────────────────────────────────────────────────────────

/// AI-analysis annotations attached to a message by agent units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Overall sentiment label (e.g. "positive", "neutral").
    pub sentiment: Option<String>,
    /// Short summary of the message body.
    pub summary: Option<String>,
    /// Extracted entities (names, addresses, organisations).
    pub entities: Vec<String>,
    /// Urgency score in [0.0, 1.0].
    pub urgency_score: Option<f32>,
}

/// An email message flowing through the processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Unique ID.
    pub id: Uuid,
    /// Sender address.
    pub sender: String,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body content.
    pub body: String,
    /// Current priority.
    pub priority: MessagePriority,
    /// Current category.
    pub category: MessageCategory,
    /// Free-form labels (deduped on patch apply).
    pub labels: Vec<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_draft: bool,
    /// Opaque metadata map. Agent units contribute entries via patches.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// AI-analysis annotations, populated by agent units.
    pub analysis: Option<AiAnalysis>,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl EmailMessage {
    /// Create an inbound message with default flags and annotations.
    pub fn inbound(
        sender: impl Into<String>,
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            recipients,
            subject: subject.into(),
            body: body.into(),
            priority: MessagePriority::Normal,
            category: MessageCategory::Primary,
            labels: Vec::new(),
            is_read: false,
            is_starred: false,
            is_draft: false,
            metadata: serde_json::Map::new(),
            analysis: None,
            received_at: Utc::now(),
        }
    }

    /// Check whether a label is present.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

// ── Patch ───────────────────────────────────────────────────────────

/// A declared set of field modifications proposed by one agent unit.
///
/// Units return a patch instead of mutating the message; the executor merges
/// patches in execution order so later units see earlier units' effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    pub priority: Option<MessagePriority>,
    pub category: Option<MessageCategory>,
    /// Labels to add (existing labels are never removed by a patch).
    #[serde(default)]
    pub add_labels: Vec<String>,
    pub mark_read: Option<bool>,
    pub mark_starred: Option<bool>,
    /// Metadata entries to merge (existing keys are overwritten).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub sentiment: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub add_entities: Vec<String>,
    pub urgency_score: Option<f32>,
}

impl MessagePatch {
    /// True when the patch proposes no modification at all.
    pub fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.category.is_none()
            && self.add_labels.is_empty()
            && self.mark_read.is_none()
            && self.mark_starred.is_none()
            && self.metadata.is_empty()
            && self.sentiment.is_none()
            && self.summary.is_none()
            && self.add_entities.is_empty()
            && self.urgency_score.is_none()
    }

    /// Merge this patch into a message.
    pub fn apply(&self, message: &mut EmailMessage) {
        if let Some(priority) = self.priority {
            message.priority = priority;
        }
        if let Some(category) = self.category {
            message.category = category;
        }
        for label in &self.add_labels {
            if !message.has_label(label) {
                message.labels.push(label.clone());
            }
        }
        if let Some(read) = self.mark_read {
            message.is_read = read;
        }
        if let Some(starred) = self.mark_starred {
            message.is_starred = starred;
        }
        for (key, value) in &self.metadata {
            message.metadata.insert(key.clone(), value.clone());
        }

        if self.sentiment.is_some()
            || self.summary.is_some()
            || !self.add_entities.is_empty()
            || self.urgency_score.is_some()
        {
            let analysis = message.analysis.get_or_insert_with(AiAnalysis::default);
            if let Some(ref sentiment) = self.sentiment {
                analysis.sentiment = Some(sentiment.clone());
            }
            if let Some(ref summary) = self.summary {
                analysis.summary = Some(summary.clone());
            }
            for entity in &self.add_entities {
                if !analysis.entities.contains(entity) {
                    analysis.entities.push(entity.clone());
                }
            }
            if let Some(score) = self.urgency_score {
                analysis.urgency_score = Some(score.clamp(0.0, 1.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(MessagePriority::Low < MessagePriority::Normal);
        assert!(MessagePriority::Normal < MessagePriority::High);
        assert!(MessagePriority::High < MessagePriority::Urgent);
    }

    #[test]
    fn priority_serde_snake_case() {
        let json = serde_json::to_string(&MessagePriority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let parsed: MessagePriority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, MessagePriority::Low);
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(MessagePatch::default().is_empty());
    }

    #[test]
    fn patch_applies_fields() {
        let mut msg = EmailMessage::inbound(
            "alice@example.com",
            vec!["me@corp.com".into()],
            "Urgent: contract",
            "Please sign today.",
        );

        let patch = MessagePatch {
            priority: Some(MessagePriority::Urgent),
            category: Some(MessageCategory::Transactional),
            add_labels: vec!["contracts".into()],
            mark_read: Some(true),
            summary: Some("Contract needs signing".into()),
            urgency_score: Some(0.9),
            ..Default::default()
        };
        patch.apply(&mut msg);

        assert_eq!(msg.priority, MessagePriority::Urgent);
        assert_eq!(msg.category, MessageCategory::Transactional);
        assert!(msg.has_label("contracts"));
        assert!(msg.is_read);
        let analysis = msg.analysis.unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("Contract needs signing"));
        assert!((analysis.urgency_score.unwrap() - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn patch_dedupes_labels_and_entities() {
        let mut msg = EmailMessage::inbound("a@x.com", vec![], "s", "b");
        msg.labels.push("vip".into());

        let patch = MessagePatch {
            add_labels: vec!["vip".into(), "follow-up".into()],
            add_entities: vec!["Acme Corp".into()],
            ..Default::default()
        };
        patch.apply(&mut msg);
        patch.apply(&mut msg);

        assert_eq!(msg.labels, vec!["vip".to_string(), "follow-up".to_string()]);
        assert_eq!(msg.analysis.unwrap().entities, vec!["Acme Corp".to_string()]);
    }

    #[test]
    fn patch_clamps_urgency_score() {
        let mut msg = EmailMessage::inbound("a@x.com", vec![], "s", "b");
        let patch = MessagePatch {
            urgency_score: Some(3.5),
            ..Default::default()
        };
        patch.apply(&mut msg);
        assert!((msg.analysis.unwrap().urgency_score.unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn patch_metadata_merge_overwrites() {
        let mut msg = EmailMessage::inbound("a@x.com", vec![], "s", "b");
        msg.metadata
            .insert("source".into(), serde_json::json!("imap"));

        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!("api"));
        metadata.insert("thread".into(), serde_json::json!("t-1"));
        let patch = MessagePatch {
            metadata,
            ..Default::default()
        };
        patch.apply(&mut msg);

        assert_eq!(msg.metadata["source"], "api");
        assert_eq!(msg.metadata["thread"], "t-1");
    }
}

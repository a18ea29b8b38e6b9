//! Bulk/spam filter unit.
//!
//! Fast regex pass over sender, subject, and body. Obvious bulk mail is
//! categorized before the heavier units run so they can skip or downrank it.

use async_trait::async_trait;
use regex::Regex;

use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics};
use crate::error::AgentError;
use crate::message::{EmailMessage, MessageCategory, MessagePatch};

/// Which message field a rule matches against.
enum RuleField {
    Sender,
    Subject,
    Body,
}

struct FilterRule {
    regex: Regex,
    field: RuleField,
    category: MessageCategory,
    label: &'static str,
}

/// Regex-based bulk mail filter.
pub struct FilterUnit {
    descriptor: AgentDescriptor,
    rules: Vec<FilterRule>,
    metrics: UnitMetrics,
}

impl FilterUnit {
    pub fn new() -> Self {
        let rules = vec![
            // noreply senders
            FilterRule {
                regex: Regex::new(r"(?i)^no[\-_.]?reply@").unwrap(),
                field: RuleField::Sender,
                category: MessageCategory::Newsletters,
                label: "bulk",
            },
            // Marketing/newsletter sending domains
            FilterRule {
                regex: Regex::new(r"(?i)@(marketing|newsletter|promo|campaign|mailer)\b").unwrap(),
                field: RuleField::Sender,
                category: MessageCategory::Newsletters,
                label: "bulk",
            },
            // Automated mail system
            FilterRule {
                regex: Regex::new(r"(?i)^(mailer[\-_]?daemon|postmaster)@").unwrap(),
                field: RuleField::Sender,
                category: MessageCategory::Transactional,
                label: "automated",
            },
            // Unsubscribe prominence in the subject
            FilterRule {
                regex: Regex::new(r"(?i)\bunsubscribe\b").unwrap(),
                field: RuleField::Subject,
                category: MessageCategory::Newsletters,
                label: "bulk",
            },
            // Bulk unsubscribe footer
            FilterRule {
                regex: Regex::new(
                    r"(?i)(click here to unsubscribe|manage your subscription|email preferences|opt[- ]?out)",
                )
                .unwrap(),
                field: RuleField::Body,
                category: MessageCategory::Newsletters,
                label: "bulk",
            },
            // Prize/lottery spam
            FilterRule {
                regex: Regex::new(r"(?i)(you (have|'ve) won|claim your (prize|reward)|act now.{0,20}limited time)")
                    .unwrap(),
                field: RuleField::Body,
                category: MessageCategory::Spam,
                label: "spam",
            },
        ];

        Self {
            descriptor: AgentDescriptor::new("builtin-filter", "Bulk mail filter", AgentKind::Filter)
                .with_capabilities(vec!["bulk-detection".into(), "spam-detection".into()]),
            rules,
            metrics: UnitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }
}

impl Default for FilterUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentUnit for FilterUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        let mut patch = MessagePatch::default();

        for rule in &self.rules {
            let haystack = match rule.field {
                RuleField::Sender => &message.sender,
                RuleField::Subject => &message.subject,
                RuleField::Body => &message.body,
            };
            if rule.regex.is_match(haystack) {
                patch.category = Some(rule.category);
                patch.add_labels.push(rule.label.to_string());
                // Spam wins over newsletter when both match.
                if rule.category == MessageCategory::Spam {
                    break;
                }
            }
        }

        self.metrics.record_success();
        Ok(patch)
    }
}

//! Keyword categorizer unit.
//!
//! Assigns a category from content keywords. Runs after the filter, so it
//! leaves messages alone once a category was already proposed upstream —
//! the executor applies patches cumulatively and this unit sees the
//! accumulated category.

use async_trait::async_trait;
use regex::Regex;

use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics};
use crate::error::AgentError;
use crate::message::{EmailMessage, MessageCategory, MessagePatch};

struct CategoryRule {
    regex: Regex,
    category: MessageCategory,
}

/// Content-keyword categorizer.
pub struct CategorizerUnit {
    descriptor: AgentDescriptor,
    rules: Vec<CategoryRule>,
    metrics: UnitMetrics,
}

impl CategorizerUnit {
    pub fn new() -> Self {
        let rules = vec![
            // Shipping, receipts, invoices
            CategoryRule {
                regex: Regex::new(
                    r"(?i)(your (order|package|shipment)|tracking (number|update)|has (shipped|been delivered)|payment (received|confirmed)|receipt for|invoice #)",
                )
                .unwrap(),
                category: MessageCategory::Transactional,
            },
            // Social network notifications
            CategoryRule {
                regex: Regex::new(
                    r"(?i)(commented on your|mentioned you|sent you a (connection|friend) request|new follower)",
                )
                .unwrap(),
                category: MessageCategory::Social,
            },
            // Discounts and sales
            CategoryRule {
                regex: Regex::new(r"(?i)(\d{1,2}% off|flash sale|discount code|coupon)").unwrap(),
                category: MessageCategory::Promotions,
            },
        ];

        Self {
            descriptor: AgentDescriptor::new(
                "builtin-categorizer",
                "Keyword categorizer",
                AgentKind::Categorizer,
            )
            .with_capabilities(vec!["categorization".into()]),
            rules,
            metrics: UnitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }
}

impl Default for CategorizerUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentUnit for CategorizerUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        let mut patch = MessagePatch::default();

        // Respect an earlier unit's categorization.
        if message.category == MessageCategory::Primary {
            for rule in &self.rules {
                if rule.regex.is_match(&message.subject) || rule.regex.is_match(&message.body) {
                    patch.category = Some(rule.category);
                    break;
                }
            }
        }

        self.metrics.record_success();
        Ok(patch)
    }
}

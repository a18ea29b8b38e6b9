//! Security scanning unit.
//!
//! Flags phishing-shaped content: credential-harvesting phrases, raw-IP and
//! punycode links, and mismatched reply-to style tricks. Findings land in a
//! "suspicious" label and a metadata entry; downstream units decide what to
//! do with them.

use async_trait::async_trait;
use regex::Regex;

use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics};
use crate::error::AgentError;
use crate::message::{EmailMessage, MessagePatch};

struct ThreatPattern {
    regex: Regex,
    finding: &'static str,
}

/// Regex-based phishing/suspicious-content scanner.
pub struct SecurityUnit {
    descriptor: AgentDescriptor,
    patterns: Vec<ThreatPattern>,
    metrics: UnitMetrics,
}

impl SecurityUnit {
    pub fn new() -> Self {
        let patterns = vec![
            ThreatPattern {
                regex: Regex::new(
                    r"(?i)(verify your (account|identity)|password (has )?expired|account (will be )?(suspended|locked))",
                )
                .unwrap(),
                finding: "credential-harvest phrase",
            },
            ThreatPattern {
                regex: Regex::new(r"https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap(),
                finding: "raw IP link",
            },
            ThreatPattern {
                regex: Regex::new(r"(?i)https?://xn--").unwrap(),
                finding: "punycode link",
            },
            ThreatPattern {
                regex: Regex::new(r"(?i)(wire transfer|gift ?cards?).{0,40}(urgent|immediately|today)")
                    .unwrap(),
                finding: "payment pressure",
            },
        ];

        Self {
            descriptor: AgentDescriptor::new(
                "builtin-security",
                "Security scanner",
                AgentKind::Security,
            )
            .with_capabilities(vec!["phishing-detection".into(), "link-scan".into()]),
            patterns,
            metrics: UnitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }
}

impl Default for SecurityUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentUnit for SecurityUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        let findings: Vec<&str> = self
            .patterns
            .iter()
            .filter(|p| p.regex.is_match(&message.body) || p.regex.is_match(&message.subject))
            .map(|p| p.finding)
            .collect();

        let mut patch = MessagePatch::default();
        if !findings.is_empty() {
            tracing::debug!(
                message_id = %message.id,
                findings = findings.len(),
                "Suspicious content flagged"
            );
            patch.add_labels.push("suspicious".to_string());
            patch
                .metadata
                .insert("security_findings".into(), serde_json::json!(findings));
        }

        self.metrics.record_success();
        Ok(patch)
    }
}

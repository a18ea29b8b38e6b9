//! Summarizer unit.
//!
//! Heuristic extractive summary: leading sentences truncated at a char
//! boundary, plus naive entity capture (email addresses and capitalized
//! name sequences). A model-backed summarizer would implement the same
//! `AgentUnit` trait.

use async_trait::async_trait;
use regex::Regex;

use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics};
use crate::error::AgentError;
use crate::message::{EmailMessage, MessagePatch};

/// Maximum summary length in bytes.
const MAX_SUMMARY_LEN: usize = 200;

/// Maximum number of entities captured per message.
const MAX_ENTITIES: usize = 8;

/// Extractive summarizer with naive entity capture.
pub struct SummarizerUnit {
    descriptor: AgentDescriptor,
    email_re: Regex,
    name_re: Regex,
    metrics: UnitMetrics,
}

impl SummarizerUnit {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                "builtin-summarizer",
                "Extractive summarizer",
                AgentKind::Summarizer,
            )
            .with_capabilities(vec!["summarization".into(), "entity-extraction".into()]),
            email_re: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            name_re: Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b").unwrap(),
            metrics: UnitMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }
}

impl Default for SummarizerUnit {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate at a char boundary, appending an ellipsis when shortened.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Take the first couple of sentences from a body.
fn leading_sentences(body: &str) -> String {
    let cleaned = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::new();
    for sentence in cleaned.split_inclusive(['.', '!', '?']) {
        out.push_str(sentence);
        if out.len() >= 120 {
            break;
        }
    }
    if out.is_empty() { cleaned } else { out }
}

#[async_trait]
impl AgentUnit for SummarizerUnit {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
        let mut patch = MessagePatch::default();

        if !message.body.trim().is_empty() {
            patch.summary = Some(truncate(
                leading_sentences(&message.body).trim(),
                MAX_SUMMARY_LEN,
            ));
        }

        let mut entities: Vec<String> = Vec::new();
        for m in self.email_re.find_iter(&message.body) {
            entities.push(m.as_str().to_string());
        }
        for m in self.name_re.find_iter(&message.body) {
            entities.push(m.as_str().to_string());
        }
        entities.dedup();
        entities.truncate(MAX_ENTITIES);
        patch.add_entities = entities;

        self.metrics.record_success();
        Ok(patch)
    }
}

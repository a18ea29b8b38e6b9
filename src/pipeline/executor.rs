//! Pipeline executor — runs every active agent unit over a message.
//!
//! The contract is fail-isolated, order-preserving, cumulative mutation:
//! units run strictly in kind order, each sees the patches applied by the
//! units before it, and one unit's failure never aborts the run or affects
//! another unit's turn. Unit failures are captured into the task ledger and
//! the outcome map — never thrown. Only the ledger's own persistence being
//! unavailable is fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::AgentRegistry;
use crate::error::Result;
use crate::message::{EmailMessage, MessagePatch};
use crate::pipeline::ledger::{AgentTask, TaskLedger};

/// Outcome of one agent unit within a pipeline run.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit_id: String,
    pub task_id: Uuid,
    pub success: bool,
    /// The applied patch on success.
    pub patch: Option<MessagePatch>,
    /// The captured error on failure.
    pub error: Option<String>,
    pub duration: Duration,
}

/// Result of one full pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    /// The message with all successful patches applied.
    pub message: EmailMessage,
    /// Per-unit outcomes keyed by unit id.
    pub outcomes: HashMap<String, UnitOutcome>,
    /// Total wall-clock time for the run.
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Number of units that completed successfully.
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.success).count()
    }

    /// Number of units that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|o| !o.success).count()
    }
}

/// Runs registered agent units over messages in fixed order.
///
/// Holds no per-run state: distinct messages may be processed concurrently
/// through the same executor.
pub struct PipelineExecutor {
    registry: Arc<AgentRegistry>,
    ledger: Arc<TaskLedger>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<AgentRegistry>, ledger: Arc<TaskLedger>) -> Self {
        Self { registry, ledger }
    }

    pub fn ledger(&self) -> &Arc<TaskLedger> {
        &self.ledger
    }

    /// Run all active units over one message.
    pub async fn run(&self, message: EmailMessage) -> Result<PipelineReport> {
        let started = Instant::now();
        let units = self.registry.execution_order().await;
        let message_id = message.id;

        info!(
            message_id = %message_id,
            units = units.len(),
            sender = %message.sender,
            "Running message pipeline"
        );

        let mut working = message;
        let mut outcomes = HashMap::with_capacity(units.len());

        for unit in units {
            let descriptor = unit.descriptor();
            let unit_id = descriptor.id.clone();
            let unit_started = Instant::now();

            let mut task = AgentTask::new(&unit_id, message_id, "process").with_params(
                serde_json::json!({
                    "kind": descriptor.kind,
                    "subject": working.subject,
                }),
            );
            if let Err(e) = task.start() {
                warn!(unit = %unit_id, error = %e, "Task could not enter processing");
            }
            self.ledger.record(&task).await?;

            // Each unit sees the accumulated message, not the original.
            match unit.process(&working).await {
                Ok(patch) => {
                    patch.apply(&mut working);

                    let result = serde_json::to_value(&patch).unwrap_or(serde_json::Value::Null);
                    if let Err(e) = task.complete(result) {
                        warn!(unit = %unit_id, error = %e, "Task already finalized");
                    }
                    self.ledger.record(&task).await?;

                    debug!(
                        unit = %unit_id,
                        message_id = %message_id,
                        empty = patch.is_empty(),
                        "Agent unit completed"
                    );
                    outcomes.insert(
                        unit_id.clone(),
                        UnitOutcome {
                            unit_id,
                            task_id: task.id,
                            success: true,
                            patch: Some(patch),
                            error: None,
                            duration: unit_started.elapsed(),
                        },
                    );
                }
                Err(e) => {
                    // Captured, not thrown: later units still get their turn.
                    let reason = e.to_string();
                    if let Err(e) = task.fail(&reason) {
                        warn!(unit = %unit_id, error = %e, "Task already finalized");
                    }
                    self.ledger.record(&task).await?;

                    warn!(
                        unit = %unit_id,
                        message_id = %message_id,
                        error = %reason,
                        "Agent unit failed; continuing pipeline"
                    );
                    outcomes.insert(
                        unit_id.clone(),
                        UnitOutcome {
                            unit_id,
                            task_id: task.id,
                            success: false,
                            patch: None,
                            error: Some(reason),
                            duration: unit_started.elapsed(),
                        },
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        info!(
            message_id = %message_id,
            succeeded = outcomes.values().filter(|o| o.success).count(),
            failed = outcomes.values().filter(|o| !o.success).count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(PipelineReport {
            message: working,
            outcomes,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::result::Result;
    use crate::agents::unit::{AgentDescriptor, AgentKind, AgentUnit};
    use crate::error::AgentError;
    use crate::message::{MessageCategory, MessagePriority};
    use crate::pipeline::ledger::TaskStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Unit that records its invocation order and returns a fixed patch.
    struct RecordingUnit {
        descriptor: AgentDescriptor,
        patch: MessagePatch,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AgentUnit for RecordingUnit {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, _message: &EmailMessage) -> Result<MessagePatch, AgentError> {
            self.calls.lock().unwrap().push(self.descriptor.id.clone());
            Ok(self.patch.clone())
        }
    }

    /// Unit that always fails.
    struct FailingUnit {
        descriptor: AgentDescriptor,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AgentUnit for FailingUnit {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, _message: &EmailMessage) -> Result<MessagePatch, AgentError> {
            self.calls.lock().unwrap().push(self.descriptor.id.clone());
            Err(AgentError::Processing {
                unit: self.descriptor.id.clone(),
                reason: "synthetic failure".into(),
            })
        }
    }

    /// Unit that asserts it sees the previous unit's category.
    struct DependentUnit {
        descriptor: AgentDescriptor,
        saw_category: Arc<Mutex<Option<MessageCategory>>>,
    }

    #[async_trait]
    impl AgentUnit for DependentUnit {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, message: &EmailMessage) -> Result<MessagePatch, AgentError> {
            *self.saw_category.lock().unwrap() = Some(message.category);
            Ok(MessagePatch::default())
        }
    }

    fn executor() -> (Arc<AgentRegistry>, PipelineExecutor) {
        let registry = Arc::new(AgentRegistry::new());
        let executor = PipelineExecutor::new(registry.clone(), Arc::new(TaskLedger::new()));
        (registry, executor)
    }

    fn sample_message() -> EmailMessage {
        EmailMessage::inbound("alice@x.com", vec!["me@corp.com".into()], "Hello", "Body?")
    }

    #[tokio::test]
    async fn units_run_in_kind_order() {
        let (registry, executor) = executor();
        let calls = Arc::new(Mutex::new(Vec::new()));

        // Registered out of order, with numeric priorities that disagree
        // with the kind table on purpose.
        for (id, kind, priority) in [
            ("resp", AgentKind::Responder, 99),
            ("filt", AgentKind::Filter, -3),
            ("cat", AgentKind::Categorizer, 7),
        ] {
            registry
                .register(Arc::new(RecordingUnit {
                    descriptor: AgentDescriptor::new(id, id, kind).with_priority(priority),
                    patch: MessagePatch::default(),
                    calls: calls.clone(),
                }))
                .await
                .unwrap();
        }

        executor.run(sample_message()).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["filt".to_string(), "cat".to_string(), "resp".to_string()]
        );
    }

    #[tokio::test]
    async fn failure_is_isolated_and_recorded() {
        let (registry, executor) = executor();
        let calls = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(Arc::new(FailingUnit {
                descriptor: AgentDescriptor::new("sec", "sec", AgentKind::Security),
                calls: calls.clone(),
            }))
            .await
            .unwrap();
        registry
            .register(Arc::new(RecordingUnit {
                descriptor: AgentDescriptor::new("sum", "sum", AgentKind::Summarizer),
                patch: MessagePatch {
                    summary: Some("still ran".into()),
                    ..Default::default()
                },
                calls: calls.clone(),
            }))
            .await
            .unwrap();

        let report = executor.run(sample_message()).await.unwrap();

        // The failing unit did not stop the later unit.
        assert_eq!(*calls.lock().unwrap(), vec!["sec", "sum"]);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            report.message.analysis.unwrap().summary.as_deref(),
            Some("still ran")
        );

        let failed = &report.outcomes["sec"];
        assert!(!failed.success);
        assert!(!failed.error.as_deref().unwrap().is_empty());

        // Ledger entry is failed with a non-empty error.
        let task = executor.ledger().get(failed.task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(!task.error.unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_units_see_earlier_modifications() {
        let (registry, executor) = executor();
        let saw = Arc::new(Mutex::new(None));

        registry
            .register(Arc::new(RecordingUnit {
                descriptor: AgentDescriptor::new("filt", "filt", AgentKind::Filter),
                patch: MessagePatch {
                    category: Some(MessageCategory::Spam),
                    ..Default::default()
                },
                calls: Arc::new(Mutex::new(Vec::new())),
            }))
            .await
            .unwrap();
        registry
            .register(Arc::new(DependentUnit {
                descriptor: AgentDescriptor::new("prio", "prio", AgentKind::Prioritizer),
                saw_category: saw.clone(),
            }))
            .await
            .unwrap();

        let report = executor.run(sample_message()).await.unwrap();
        assert_eq!(*saw.lock().unwrap(), Some(MessageCategory::Spam));
        assert_eq!(report.message.category, MessageCategory::Spam);
    }

    #[tokio::test]
    async fn output_equals_sequential_patch_application() {
        let (registry, executor) = executor();

        registry
            .register(Arc::new(RecordingUnit {
                descriptor: AgentDescriptor::new("filt", "filt", AgentKind::Filter),
                patch: MessagePatch {
                    category: Some(MessageCategory::Newsletters),
                    add_labels: vec!["bulk".into()],
                    ..Default::default()
                },
                calls: Arc::new(Mutex::new(Vec::new())),
            }))
            .await
            .unwrap();
        registry
            .register(Arc::new(FailingUnit {
                descriptor: AgentDescriptor::new("cat", "cat", AgentKind::Categorizer),
                calls: Arc::new(Mutex::new(Vec::new())),
            }))
            .await
            .unwrap();
        registry
            .register(Arc::new(RecordingUnit {
                descriptor: AgentDescriptor::new("prio", "prio", AgentKind::Prioritizer),
                patch: MessagePatch {
                    priority: Some(MessagePriority::Low),
                    ..Default::default()
                },
                calls: Arc::new(Mutex::new(Vec::new())),
            }))
            .await
            .unwrap();

        let input = sample_message();
        let mut expected = input.clone();
        let report = executor.run(input).await.unwrap();

        // Sequential application of only the successful patches.
        report.outcomes["filt"]
            .patch
            .as_ref()
            .unwrap()
            .apply(&mut expected);
        report.outcomes["prio"]
            .patch
            .as_ref()
            .unwrap()
            .apply(&mut expected);

        assert_eq!(report.message.category, expected.category);
        assert_eq!(report.message.priority, expected.priority);
        assert_eq!(report.message.labels, expected.labels);
    }

    #[tokio::test]
    async fn empty_registry_returns_message_unchanged() {
        let (_registry, executor) = executor();
        let input = sample_message();
        let subject = input.subject.clone();

        let report = executor.run(input).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.message.subject, subject);
    }
}

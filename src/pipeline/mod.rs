//! Message processing pipeline.
//!
//! One message flows through every active agent unit in kind order. Unit
//! failures are captured into the task ledger and the outcome map; they
//! never abort the run.

pub mod executor;
pub mod ledger;

pub use executor::{PipelineExecutor, PipelineReport, UnitOutcome};
pub use ledger::{AgentTask, TaskLedger, TaskStatus};

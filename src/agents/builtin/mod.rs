//! Built-in heuristic agent units.
//!
//! These cover the fast, model-free portion of the pipeline. Model-backed
//! units (responder, translator) plug in through the same `AgentUnit` trait.

pub mod categorizer;
pub mod filter;
pub mod prioritizer;
pub mod security;
pub mod summarizer;

use std::sync::Arc;

pub use categorizer::CategorizerUnit;
pub use filter::FilterUnit;
pub use prioritizer::PrioritizerUnit;
pub use security::SecurityUnit;
pub use summarizer::SummarizerUnit;

use crate::agents::unit::AgentUnit;

/// The standard built-in unit set, in no particular order — the registry
/// derives execution order from each unit's kind.
pub fn standard_units() -> Vec<Arc<dyn AgentUnit>> {
    vec![
        Arc::new(SecurityUnit::new()),
        Arc::new(FilterUnit::new()),
        Arc::new(CategorizerUnit::new()),
        Arc::new(PrioritizerUnit::new()),
        Arc::new(SummarizerUnit::new()),
    ]
}

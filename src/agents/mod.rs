//! Agent units and their registry.
//!
//! An agent unit is a pluggable, fail-isolated processing capability. Units
//! are registered once at startup; the registry derives the pipeline's
//! execution order from the fixed kind-rank table.

pub mod builtin;
pub mod registry;
pub mod unit;

pub use registry::AgentRegistry;
pub use unit::{AgentDescriptor, AgentKind, AgentUnit, UnitMetrics, UnitStatus};

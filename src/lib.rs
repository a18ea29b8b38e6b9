//! mailflow — campaign processing engine.
//!
//! Two cores: a priority-ordered, fail-isolated agent pipeline over email
//! messages, and a campaign scheduler/state machine over an asynchronous
//! job queue.

pub mod agents;
pub mod campaign;
pub mod config;
pub mod error;
pub mod message;
pub mod persist;
pub mod pipeline;
pub mod queue;

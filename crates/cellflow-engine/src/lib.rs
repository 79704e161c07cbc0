//! cellflow_engine - Formula parsing, evaluation and dependency tracking.

pub mod builtins;
pub mod engine;

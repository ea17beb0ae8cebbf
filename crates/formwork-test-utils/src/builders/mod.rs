//! Builders for workflow definitions and record snapshots.

mod workflow;

// Re-export all builders for easy access
pub use workflow::{record_snapshot, WorkflowBuilder};

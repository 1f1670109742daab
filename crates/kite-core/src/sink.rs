use kite_model::ResourceKey;

use crate::error::ReconcileError;

/// A key that was given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub key: ResourceKey,
    /// The last error observed.
    pub error: ReconcileError,
    /// Number of reconcile attempts, including the last one.
    pub attempts: u32,
}

/// Receives keys that failed permanently or exhausted their retries.
///
/// Called from worker tasks: implementations must not block. A panic inside `report` is caught
/// and logged by the worker.
pub trait FailureSink: Send + Sync {
    fn report(&self, report: &FailureReport);
}

/// Drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FailureSink for DiscardSink {
    fn report(&self, _report: &FailureReport) {}
}

use std::time::Duration;

/// How a single pass over a key ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Reconciler succeeded on a present object.
    Success,
    /// Object was gone at dequeue time; absence handled.
    Absent,
    /// Failed and was scheduled for another attempt.
    Retry,
    /// Failed permanently or hit the retry ceiling.
    Dropped,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Success => "success",
            ReconcileOutcome::Absent => "absent",
            ReconcileOutcome::Retry => "retry",
            ReconcileOutcome::Dropped => "dropped",
        }
    }
}

/// Hooks called by the queue, workers and dispatcher.
///
/// Every method defaults to a no-op so backends implement only what they export.
/// Implementations must be cheap and must not block.
pub trait ControllerMetrics: Send + Sync {
    fn queue_added(&self) {}
    fn queue_depth(&self, _depth: usize) {}
    fn queue_retried(&self) {}
    fn reconciled(&self, _outcome: ReconcileOutcome, _elapsed: Duration) {}
    fn watch_event(&self, _event: &'static str) {}
    fn watch_restarted(&self) {}
}

pub struct NoopMetrics;

impl ControllerMetrics for NoopMetrics {}

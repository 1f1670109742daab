use kite_core::{FailureReport, FailureSink, ReconcileError};
use tracing::error;

/// Emits one error-level record per dropped key.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn message_for(err: &ReconcileError) -> &'static str {
    match err {
        ReconcileError::Permanent { .. } => "key failed permanently; dropped until next change",
        ReconcileError::Transient { .. } => "key exhausted retries; dropped until next change",
    }
}

impl FailureSink for LogSink {
    fn report(&self, report: &FailureReport) {
        let msg = message_for(&report.error);
        error!(
            key = %report.key,
            kind = %report.key.kind(),
            attempts = report.attempts,
            reason = report.error.reason(),
            "{msg}"
        );
    }
}

use thiserror::Error;

use kite_model::ResourceKind;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("stopped before the cache finished its initial sync")]
    SyncAborted,
    #[error("timed out after {0:?} waiting for the cache to sync")]
    SyncTimeout(std::time::Duration),
    #[error("invalid controller config: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a reconciler for one key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Worth retrying with backoff (downstream temporarily unavailable, timeouts).
    #[error("{reason}")]
    Transient { reason: String },
    /// Retrying cannot help (malformed object, rejected by downstream).
    #[error("{reason}")]
    Permanent { reason: String },
}

impl ReconcileError {
    pub fn transient(reason: impl Into<String>) -> Self {
        ReconcileError::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        ReconcileError::Permanent {
            reason: reason.into(),
        }
    }

    pub fn no_route(kind: ResourceKind) -> Self {
        ReconcileError::permanent(format!("no reconciler registered for kind {kind}"))
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        matches!(self, ReconcileError::Permanent { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            ReconcileError::Transient { reason } | ReconcileError::Permanent { reason } => reason,
        }
    }
}

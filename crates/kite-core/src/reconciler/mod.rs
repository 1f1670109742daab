//! Reconciler abstraction and kind-based routing.

mod router;
pub use router::ReconcilerRouter;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use kite_model::{Resource, ResourceKey};

use crate::error::ReconcileError;

/// User-supplied convergence logic for one key.
///
/// Called with the *latest* cached snapshot, never with the event that triggered it, so
/// intermediate states may be skipped. Implementations must be idempotent: the same key can be
/// reconciled any number of times with the same snapshot.
///
/// `cancel` fires when the controller shuts down or the call exceeds its deadline; long-running
/// work should observe it and return promptly.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Converge external state towards `resource`.
    async fn reconcile(
        &self,
        key: &ResourceKey,
        resource: &Resource,
        cancel: CancellationToken,
    ) -> Result<(), ReconcileError>;

    /// `key` is no longer present in the cache (deleted, or moved out of the selector).
    ///
    /// Absence is not an error; clean up whatever was derived from the object.
    async fn absent(&self, key: &ResourceKey, cancel: CancellationToken) {
        let _ = (key, cancel);
    }
}

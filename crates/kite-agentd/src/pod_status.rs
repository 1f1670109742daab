use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use kite_core::{ReconcileError, Reconciler};
use kite_model::{InitState, Resource, ResourceKey};

/// Reports the init-container state of every watched pod.
///
/// Used when no hook is configured: it only observes, so it never fails for a pod.
#[derive(Debug, Default, Clone, Copy)]
pub struct PodStatusReconciler;

pub(crate) fn describe(state: &InitState) -> String {
    match state {
        InitState::NotInitialized => "init container statuses not reported yet".to_string(),
        InitState::Waiting { reason: Some(r) } => format!("init container waiting ({r})"),
        InitState::Waiting { reason: None } => "init container waiting".to_string(),
        InitState::Running => "init container running".to_string(),
        InitState::Terminated { exit_code } => {
            format!("init container terminated (exit code {exit_code})")
        }
        InitState::Unknown => "init container state unknown".to_string(),
    }
}

#[async_trait]
impl Reconciler for PodStatusReconciler {
    fn name(&self) -> &'static str {
        "pod-status"
    }

    async fn reconcile(
        &self,
        key: &ResourceKey,
        resource: &Resource,
        _cancel: CancellationToken,
    ) -> Result<(), ReconcileError> {
        let Some(pod) = resource.as_pod() else {
            return Err(ReconcileError::permanent(format!(
                "{} is not a pod",
                resource.kind()
            )));
        };
        info!(
            key = %key,
            phase = pod.phase(),
            rv = resource.resource_version().unwrap_or("-"),
            "{}",
            describe(&pod.init_state())
        );
        Ok(())
    }

    async fn absent(&self, key: &ResourceKey, _cancel: CancellationToken) {
        info!(key = %key, "pod deleted");
    }
}

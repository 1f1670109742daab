use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace};

use kite_model::{Resource, ResourceKey, ResourceKind};

use crate::{error::ReconcileError, reconciler::Reconciler};

/// Dispatches each key to the reconciler registered for its kind.
///
/// A key whose kind has no route is a wiring bug, not a runtime condition: it fails
/// permanently so it is reported once instead of retried forever.
#[derive(Default)]
pub struct ReconcilerRouter {
    routes: HashMap<ResourceKind, Arc<dyn Reconciler>>,
}

impl ReconcilerRouter {
    #[inline]
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `reconciler` for `kind`, replacing any previous route.
    #[inline]
    pub fn register(&mut self, kind: ResourceKind, reconciler: Arc<dyn Reconciler>) {
        self.routes.insert(kind, reconciler);
    }

    #[inline]
    pub fn route(mut self, kind: ResourceKind, reconciler: Arc<dyn Reconciler>) -> Self {
        self.register(kind, reconciler);
        self
    }

    pub fn pick(&self, kind: ResourceKind) -> Option<&Arc<dyn Reconciler>> {
        self.routes.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.routes.keys().copied()
    }
}

#[async_trait]
impl Reconciler for ReconcilerRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    #[instrument(level = "trace", skip(self, resource, cancel), fields(key = %key))]
    async fn reconcile(
        &self,
        key: &ResourceKey,
        resource: &Resource,
        cancel: CancellationToken,
    ) -> Result<(), ReconcileError> {
        let Some(r) = self.pick(key.kind()) else {
            error!(key = %key, kind = %key.kind(), "no reconciler registered for kind");
            return Err(ReconcileError::no_route(key.kind()));
        };
        trace!(reconciler = r.name(), "routing");
        r.reconcile(key, resource, cancel).await
    }

    async fn absent(&self, key: &ResourceKey, cancel: CancellationToken) {
        match self.pick(key.kind()) {
            Some(r) => r.absent(key, cancel).await,
            None => error!(key = %key, kind = %key.kind(), "no reconciler registered for kind"),
        }
    }
}

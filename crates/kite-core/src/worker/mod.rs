//! Worker loop: dequeue a key, reconcile it against the cache, apply the retry policy.

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use kite_model::ResourceKey;

use crate::{
    cache::ResourceCache,
    error::ReconcileError,
    metrics::{ControllerMetrics, NoopMetrics, ReconcileOutcome},
    queue::ChangeQueue,
    reconciler::Reconciler,
    sink::{DiscardSink, FailureReport, FailureSink},
};

/// Default number of retries before a key is dropped.
pub const DEFAULT_RETRY_CEILING: u32 = 5;

/// Pulls keys from a [`ChangeQueue`] until it shuts down.
///
/// For every key:
/// 1. look up the current snapshot; if the key is gone call [`Reconciler::absent`], which
///    always counts as handled;
/// 2. otherwise call [`Reconciler::reconcile`] under the optional deadline, catching panics;
/// 3. on success clear the key's retry history;
/// 4. on a transient failure below the retry ceiling schedule a rate-limited retry;
/// 5. otherwise clear the history and hand a [`FailureReport`] to the sink;
/// 6. always release the key with [`ChangeQueue::done`].
pub struct ReconcileWorker {
    id: usize,
    queue: ChangeQueue,
    cache: ResourceCache,
    reconciler: Arc<dyn Reconciler>,
    sink: Arc<dyn FailureSink>,
    metrics: Arc<dyn ControllerMetrics>,
    retry_ceiling: u32,
    reconcile_timeout: Option<Duration>,
}

impl ReconcileWorker {
    pub fn new(
        id: usize,
        queue: ChangeQueue,
        cache: ResourceCache,
        reconciler: Arc<dyn Reconciler>,
    ) -> Self {
        Self {
            id,
            queue,
            cache,
            reconciler,
            sink: Arc::new(DiscardSink),
            metrics: Arc::new(NoopMetrics),
            retry_ceiling: DEFAULT_RETRY_CEILING,
            reconcile_timeout: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Retries granted to a transiently failing key before it is dropped. `0` never retries.
    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    pub fn with_reconcile_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// Process keys until the queue is shut down.
    ///
    /// `cancel` is handed to every reconciler call; cancelling it does not stop the loop.
    pub async fn run(self, cancel: CancellationToken) {
        debug!(worker = self.id, "worker started");
        while let Some(key) = self.queue.get().await {
            let span = info_span!("reconcile", worker = self.id, key = %key);
            self.process(key, &cancel).instrument(span).await;
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// Run one pass over `key`, which must have been obtained from the queue.
    pub async fn process(&self, key: ResourceKey, cancel: &CancellationToken) -> ReconcileOutcome {
        let started = Instant::now();
        let call_cancel = cancel.child_token();
        let outcome = match self.cache.get(&key) {
            None => {
                let call = self.reconciler.absent(&key, call_cancel.clone());
                // Absence never fails the key, even if the handler panicked or overran.
                if let Err(err) = self.guarded(call.map(Ok), &call_cancel).await {
                    error!(error = %err, "absence handler failed");
                }
                self.queue.forget(&key);
                debug!("absent key handled");
                ReconcileOutcome::Absent
            }
            Some(resource) => {
                let call = self.reconciler.reconcile(&key, &resource, call_cancel.clone());
                match self.guarded(call, &call_cancel).await {
                    Ok(()) => {
                        self.queue.forget(&key);
                        debug!(version = resource.resource_version().unwrap_or(""), "reconciled");
                        ReconcileOutcome::Success
                    }
                    Err(err) => self.failed(&key, err),
                }
            }
        };
        self.queue.done(&key);
        self.metrics.reconciled(outcome, started.elapsed());
        outcome
    }

    /// Await a reconciler call, converting a panic or an expired deadline into a transient error.
    ///
    /// `cancel` is the call's own token and is fired when the deadline passes.
    async fn guarded<F>(&self, call: F, cancel: &CancellationToken) -> Result<(), ReconcileError>
    where
        F: Future<Output = Result<(), ReconcileError>>,
    {
        let call = AssertUnwindSafe(call).catch_unwind();
        let result = match self.reconcile_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => {
                    cancel.cancel();
                    return Err(ReconcileError::transient(format!(
                        "reconcile timed out after {limit:?}"
                    )));
                }
            },
            None => call.await,
        };
        result.unwrap_or_else(|panic| {
            Err(ReconcileError::transient(format!(
                "reconciler panicked: {}",
                panic_message(panic.as_ref())
            )))
        })
    }

    fn failed(&self, key: &ResourceKey, err: ReconcileError) -> ReconcileOutcome {
        let retries = self.queue.num_requeues(key);
        let attempts = retries.saturating_add(1);
        if !err.is_permanent() && retries < self.retry_ceiling {
            warn!(attempt = attempts, error = %err, "reconcile failed; retrying");
            self.queue.add_rate_limited(key.clone());
            return ReconcileOutcome::Retry;
        }

        self.queue.forget(key);
        error!(
            attempts,
            permanent = err.is_permanent(),
            error = %err,
            "reconcile failed; giving up"
        );
        let report = FailureReport {
            key: key.clone(),
            error: err,
            attempts,
        };
        if std::panic::catch_unwind(AssertUnwindSafe(|| self.sink.report(&report))).is_err() {
            error!("failure sink panicked");
        }
        ReconcileOutcome::Dropped
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests;

//! Top-level wiring: one dispatcher and a pool of workers over a shared cache and queue.

mod config;
pub use config::ControllerConfig;

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    cache::{CacheReader, ResourceCache},
    error::CoreError,
    metrics::{ControllerMetrics, NoopMetrics},
    queue::{ChangeQueue, RateLimiter, default_controller_limiter},
    reconciler::Reconciler,
    sink::{DiscardSink, FailureSink},
    watch::{WatchDispatcher, WatchSource},
    worker::ReconcileWorker,
};

/// Owns every shared component of one control loop.
///
/// Built with [`Controller::builder`]; [`Controller::run`] drives it until cancelled.
pub struct Controller {
    source: Arc<dyn WatchSource>,
    reconciler: Arc<dyn Reconciler>,
    sink: Arc<dyn FailureSink>,
    metrics: Arc<dyn ControllerMetrics>,
    cfg: ControllerConfig,
    cache: ResourceCache,
    queue: ChangeQueue,
}

pub struct ControllerBuilder {
    source: Arc<dyn WatchSource>,
    reconciler: Arc<dyn Reconciler>,
    sink: Arc<dyn FailureSink>,
    metrics: Arc<dyn ControllerMetrics>,
    limiter: Option<Box<dyn RateLimiter>>,
    cfg: ControllerConfig,
}

impl ControllerBuilder {
    pub fn with_config(mut self, cfg: ControllerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the retry limiter built from `backoff` and `bucket`.
    pub fn with_rate_limiter(mut self, limiter: Box<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<Controller, CoreError> {
        self.cfg.validate()?;
        let limiter = self.limiter.unwrap_or_else(|| {
            Box::new(default_controller_limiter(self.cfg.backoff, self.cfg.bucket))
        });
        let queue = ChangeQueue::with_metrics(limiter, Arc::clone(&self.metrics));

        Ok(Controller {
            source: self.source,
            reconciler: self.reconciler,
            sink: self.sink,
            metrics: self.metrics,
            cfg: self.cfg,
            cache: ResourceCache::new(),
            queue,
        })
    }
}

impl Controller {
    pub fn builder(
        source: Arc<dyn WatchSource>,
        reconciler: Arc<dyn Reconciler>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            source,
            reconciler,
            sink: Arc::new(DiscardSink),
            metrics: Arc::new(NoopMetrics),
            limiter: None,
            cfg: ControllerConfig::default(),
        }
    }

    /// Read-only view of the cache; the watch dispatcher remains its only writer.
    pub fn cache(&self) -> CacheReader {
        self.cache.reader()
    }

    pub fn queue(&self) -> ChangeQueue {
        self.queue.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.cfg
    }

    /// Run until `cancel` fires.
    ///
    /// Lifecycle:
    /// 1. start the watch dispatcher;
    /// 2. wait for the initial listing to land in the cache;
    /// 3. start the workers;
    /// 4. on cancellation stop the watch, close the queue and give in-flight reconciles
    ///    `shutdown_grace` to finish before aborting them.
    ///
    /// Fails only when the cache never syncs (cancelled first, or `sync_timeout` elapsed).
    pub async fn run(self, cancel: CancellationToken) -> Result<(), CoreError> {
        let kind = self.source.kind();
        let watch_stop = cancel.child_token();
        let dispatcher = WatchDispatcher::new(
            Arc::clone(&self.source),
            self.cache.clone(),
            self.queue.clone(),
        )
        .with_config(self.cfg.dispatch())
        .with_metrics(Arc::clone(&self.metrics));
        let dispatch = tokio::spawn(dispatcher.run(watch_stop.clone()));

        info!(%kind, "waiting for cache sync");
        if let Err(e) = self.wait_for_sync(&cancel).await {
            watch_stop.cancel();
            self.queue.shutdown();
            if let Err(join) = dispatch.await {
                error!(error = %join, "watch dispatcher task failed");
            }
            return Err(e);
        }
        info!(%kind, objects = self.cache.len(), workers = self.cfg.workers, "cache synced; starting workers");

        let work_cancel = CancellationToken::new();
        let mut workers = JoinSet::new();
        for id in 0..self.cfg.workers {
            let worker = ReconcileWorker::new(
                id,
                self.queue.clone(),
                self.cache.clone(),
                Arc::clone(&self.reconciler),
            )
            .with_sink(Arc::clone(&self.sink))
            .with_metrics(Arc::clone(&self.metrics))
            .with_retry_ceiling(self.cfg.retry_ceiling)
            .with_reconcile_timeout(self.cfg.reconcile_timeout);
            workers.spawn(worker.run(work_cancel.clone()));
        }

        cancel.cancelled().await;
        info!(%kind, "shutdown requested");
        watch_stop.cancel();
        self.queue.shutdown();

        let drained = tokio::time::timeout(self.cfg.shutdown_grace, async {
            while let Some(res) = workers.join_next().await {
                if let Err(e) = res {
                    error!(error = %e, "worker task failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = workers.len(),
                grace_ms = self.cfg.shutdown_grace.as_millis() as u64,
                "workers did not finish in time; aborting"
            );
            work_cancel.cancel();
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        if let Err(e) = dispatch.await {
            error!(error = %e, "watch dispatcher task failed");
        }
        info!(%kind, "controller stopped");
        Ok(())
    }

    async fn wait_for_sync(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        let synced = async {
            match self.cfg.sync_timeout {
                Some(limit) => tokio::time::timeout(limit, self.cache.wait_for_sync())
                    .await
                    .map_err(|_| CoreError::SyncTimeout(limit)),
                None => {
                    self.cache.wait_for_sync().await;
                    Ok(())
                }
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(CoreError::SyncAborted),
            r = synced => r,
        }
    }
}

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use kite_model::{ChangeEvent, Resource, ResourceKey};

use crate::{
    cache::ResourceCache,
    metrics::{ControllerMetrics, NoopMetrics},
    queue::{BackoffConfig, ChangeQueue},
    watch::{WatchError, WatchEvent, WatchSource},
};

/// Tuning for [`WatchDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Delay between list/watch attempts after a failure.
    pub relist_backoff: BackoffConfig,
    /// Re-enqueue every cached key at this interval. `None` disables resync.
    pub resync_period: Option<Duration>,
    /// Capacity of the channel between the reflector and the cache writer.
    pub channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            relist_backoff: BackoffConfig {
                base_ms: 200,
                max_ms: 30_000,
            },
            resync_period: None,
            channel_capacity: 256,
        }
    }
}

/// Change extracted from the source, applied to the cache in arrival order.
enum Delta {
    Replace(Vec<Resource>),
    Upsert(Resource),
    Remove(Resource),
}

/// Mirrors a [`WatchSource`] into the [`ResourceCache`] and enqueues every changed key.
///
/// Runs two cooperating loops:
/// - the reflector lists the source, then follows its watch stream, relisting whenever the
///   stream ends or fails;
/// - the writer owns every cache mutation and pushes the affected key to the queue right after
///   the cache reflects the change.
///
/// A worker that dequeues a key therefore always observes a cache state at least as new as the
/// event that enqueued it.
pub struct WatchDispatcher {
    source: Arc<dyn WatchSource>,
    cache: ResourceCache,
    queue: ChangeQueue,
    metrics: Arc<dyn ControllerMetrics>,
    cfg: DispatchConfig,
}

impl WatchDispatcher {
    pub fn new(source: Arc<dyn WatchSource>, cache: ResourceCache, queue: ChangeQueue) -> Self {
        Self {
            source,
            cache,
            queue,
            metrics: Arc::new(NoopMetrics),
            cfg: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: DispatchConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run until `stop` is cancelled.
    ///
    /// Changes already received when `stop` fires are still written to the cache before this
    /// returns.
    pub async fn run(self, stop: CancellationToken) {
        let (tx, rx) = mpsc::channel(self.cfg.channel_capacity.max(1));
        info!(kind = %self.source.kind(), "watch dispatcher started");
        tokio::join!(self.reflect(tx, stop), self.write(rx));
        info!(kind = %self.source.kind(), "watch dispatcher stopped");
    }

    async fn reflect(&self, tx: mpsc::Sender<Delta>, stop: CancellationToken) {
        let mut failures: u32 = 0;
        loop {
            let result = tokio::select! {
                _ = stop.cancelled() => break,
                r = self.list_and_watch(&tx) => r,
            };

            let delay = match result {
                Ok(()) => {
                    failures = 0;
                    debug!("watch stream ended; relisting");
                    self.cfg.relist_backoff.delay(0)
                }
                Err(e) if e.relist_now() => {
                    failures = 0;
                    info!(error = %e, "watch interrupted; relisting");
                    Duration::ZERO
                }
                Err(e) => {
                    let delay = self.cfg.relist_backoff.delay(failures);
                    failures = failures.saturating_add(1);
                    warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "list/watch failed; backing off"
                    );
                    delay
                }
            };
            self.metrics.watch_restarted();

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        // Dropping `tx` lets the writer drain and exit.
    }

    async fn list_and_watch(&self, tx: &mpsc::Sender<Delta>) -> Result<(), WatchError> {
        let list = self.source.list().await?;
        debug!(
            items = list.items.len(),
            version = %list.resource_version,
            "listed source"
        );
        let version = list.resource_version;
        tx.send(Delta::Replace(list.items))
            .await
            .map_err(|_| WatchError::Closed)?;

        let mut stream = self.source.watch(&version).await?;
        while let Some(next) = stream.next().await {
            let event = next?;
            self.metrics.watch_event(event.name());
            let delta = match event {
                WatchEvent::Added(r) | WatchEvent::Modified(r) => Delta::Upsert(r),
                WatchEvent::Deleted(r) => Delta::Remove(r),
                WatchEvent::Bookmark(rv) => {
                    trace!(version = %rv, "bookmark");
                    continue;
                }
            };
            tx.send(delta).await.map_err(|_| WatchError::Closed)?;
        }
        Ok(())
    }

    async fn write(&self, mut rx: mpsc::Receiver<Delta>) {
        let mut resync = self.cfg.resync_period.map(|period| {
            let mut i = tokio::time::interval_at(Instant::now() + period, period);
            i.set_missed_tick_behavior(MissedTickBehavior::Skip);
            i
        });

        loop {
            tokio::select! {
                delta = rx.recv() => match delta {
                    Some(delta) => self.apply(delta),
                    None => break,
                },
                _ = tick(&mut resync) => self.resync(),
            }
        }
    }

    fn apply(&self, delta: Delta) {
        match delta {
            Delta::Replace(items) => {
                let keyed: Vec<_> = items.into_iter().filter_map(|r| self.keyed(r)).collect();
                let first = !self.cache.has_synced();
                let count = keyed.len();
                let events = self.cache.replace(self.source.kind(), keyed);
                if first {
                    info!(kind = %self.source.kind(), objects = count, "cache synced");
                } else {
                    debug!(kind = %self.source.kind(), objects = count, "cache relisted");
                }
                for event in events {
                    self.enqueue(event);
                }
            }
            Delta::Upsert(resource) => {
                if let Some((key, resource)) = self.keyed(resource) {
                    let event = self.cache.upsert(key, resource);
                    self.enqueue(event);
                }
            }
            Delta::Remove(resource) => {
                if let Some((key, resource)) = self.keyed(resource) {
                    let last = self
                        .cache
                        .delete(&key)
                        .unwrap_or_else(|| Arc::new(resource));
                    self.enqueue(ChangeEvent::Deleted { key, last });
                }
            }
        }
    }

    fn keyed(&self, resource: Resource) -> Option<(ResourceKey, Resource)> {
        if resource.kind() != self.source.kind() {
            warn!(
                expected = %self.source.kind(),
                got = %resource.kind(),
                "dropping object of unexpected kind"
            );
            return None;
        }
        match resource.key() {
            Ok(key) => Some((key, resource)),
            Err(e) => {
                warn!(error = %e, "dropping object without identity");
                None
            }
        }
    }

    fn enqueue(&self, event: ChangeEvent) {
        trace!(key = %event.key(), event = event.name(), "change applied");
        self.queue.add(event.key().clone());
    }

    fn resync(&self) {
        let kind = self.source.kind();
        let keys: Vec<ResourceKey> = self
            .cache
            .keys()
            .into_iter()
            .filter(|k| k.kind() == kind)
            .collect();
        debug!(kind = %kind, keys = keys.len(), "periodic resync");
        for key in keys {
            self.queue.add(key);
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending().await,
    }
}

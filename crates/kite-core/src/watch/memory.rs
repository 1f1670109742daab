use std::{
    collections::BTreeMap,
    sync::Mutex,
};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use kite_model::{LabelSelector, ModelError, Resource, ResourceKey, ResourceKind, ResourceVersion};

use crate::{
    sync::lock,
    watch::{ResourceList, WatchError, WatchEvent, WatchSource, WatchStream},
};

type WatchSender = mpsc::UnboundedSender<Result<WatchEvent, WatchError>>;

/// In-process watch source backed by a versioned map.
///
/// Every write bumps a monotonically increasing version that is stamped on the object, recorded
/// in a history log and pushed to open watches. A watch opened at version `v` first replays every
/// recorded event newer than `v`, so nothing written between a list and the following watch is
/// missed. Writes that move an object in or out of the selector surface as `Added`/`Deleted`.
pub struct MemorySource {
    kind: ResourceKind,
    selector: LabelSelector,
    namespace: Option<String>,
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: BTreeMap<ResourceKey, Resource>,
    version: u64,
    history: Vec<(u64, WatchEvent)>,
    /// Watches from versions below this mark are rejected as expired.
    compacted_at: u64,
    watchers: Vec<WatchSender>,
    list_failures: Vec<WatchError>,
    list_calls: usize,
}

impl MemorySource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            selector: LabelSelector::everything(),
            namespace: None,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    pub fn with_selector(mut self, selector: LabelSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn visible(&self, resource: &Resource) -> bool {
        resource.kind() == self.kind
            && self
                .namespace
                .as_deref()
                .is_none_or(|ns| resource.meta().namespace.as_deref() == Some(ns))
            && self.selector.matches(resource.labels())
    }

    /// Create or replace an object; returns the version stamped on it.
    pub fn apply(&self, mut resource: Resource) -> Result<ResourceVersion, ModelError> {
        let key = resource.key()?;
        let mut inner = lock(&self.inner);
        inner.version += 1;
        let version = inner.version;
        resource.meta_mut().resource_version = Some(version.to_string());

        let was_visible = inner.objects.get(&key).is_some_and(|old| self.visible(old));
        let now_visible = self.visible(&resource);
        inner.objects.insert(key, resource.clone());

        let event = match (was_visible, now_visible) {
            (false, true) => Some(WatchEvent::Added(resource)),
            (true, true) => Some(WatchEvent::Modified(resource)),
            (true, false) => Some(WatchEvent::Deleted(resource)),
            (false, false) => None,
        };
        if let Some(event) = event {
            inner.publish(version, event);
        }
        Ok(version.to_string())
    }

    /// Delete an object, returning its last state.
    pub fn remove(&self, key: &ResourceKey) -> Option<Resource> {
        let mut inner = lock(&self.inner);
        let mut last = inner.objects.remove(key)?;
        inner.version += 1;
        let version = inner.version;
        if self.visible(&last) {
            last.meta_mut().resource_version = Some(version.to_string());
            inner.publish(version, WatchEvent::Deleted(last.clone()));
        }
        Some(last)
    }

    /// End every open watch stream, as a dropped connection would.
    pub fn disconnect(&self) {
        lock(&self.inner).watchers.clear();
    }

    /// Fail every open watch stream with `err` and close it.
    pub fn inject_error(&self, err: WatchError) {
        let watchers = std::mem::take(&mut lock(&self.inner).watchers);
        for tx in watchers {
            let _ = tx.send(Err(err.clone()));
        }
    }

    /// Make the next `list` call fail with `err`.
    pub fn fail_next_list(&self, err: WatchError) {
        lock(&self.inner).list_failures.push(err);
    }

    /// Drop the event history; watches from older versions then fail with `Expired`.
    pub fn compact(&self) {
        let mut inner = lock(&self.inner);
        inner.history.clear();
        inner.compacted_at = inner.version;
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.inner).list_calls
    }

    pub fn open_watches(&self) -> usize {
        let mut inner = lock(&self.inner);
        inner.watchers.retain(|tx| !tx.is_closed());
        inner.watchers.len()
    }
}

impl MemoryInner {
    fn publish(&mut self, version: u64, event: WatchEvent) {
        self.watchers
            .retain(|tx| tx.send(Ok(event.clone())).is_ok());
        self.history.push((version, event));
    }
}

#[async_trait]
impl WatchSource for MemorySource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list(&self) -> Result<ResourceList, WatchError> {
        let mut inner = lock(&self.inner);
        inner.list_calls += 1;
        if !inner.list_failures.is_empty() {
            return Err(inner.list_failures.remove(0));
        }
        let items = inner
            .objects
            .values()
            .filter(|r| self.visible(r))
            .cloned()
            .collect();
        Ok(ResourceList {
            items,
            resource_version: inner.version.to_string(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, WatchError> {
        let from: u64 = resource_version
            .parse()
            .map_err(|_| WatchError::Decode(format!("bad resource version {resource_version:?}")))?;

        let mut inner = lock(&self.inner);
        if from < inner.compacted_at {
            return Err(WatchError::Expired);
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        for (_, event) in inner.history.iter().filter(|(v, _)| *v > from) {
            let _ = tx.send(Ok(event.clone()));
        }
        inner.watchers.push(tx);

        let stream = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(stream.boxed())
    }
}

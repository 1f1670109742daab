use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use tokio::sync::watch;

use kite_model::{ChangeEvent, Resource, ResourceKey, ResourceKind};

use crate::sync::{read, write};

/// In-memory mirror of the watched collection.
///
/// Cloning is cheap: clones share the same storage. Every operation takes the single instance
/// lock, so reads and writes are linearizable per key. Snapshots are stored behind [`Arc`] and
/// replaced wholesale on write; a handle returned by [`ResourceCache::get`] never changes.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<RwLock<CacheInner>>,
    synced: Arc<watch::Sender<bool>>,
}

struct CacheInner {
    objects: HashMap<ResourceKey, Arc<Resource>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                objects: HashMap::new(),
            })),
            synced: Arc::new(synced),
        }
    }

    /// Insert or overwrite the snapshot for `key`.
    ///
    /// Returns `Added` when the key was unknown and `Updated` (carrying the replaced snapshot)
    /// otherwise.
    pub fn upsert(&self, key: ResourceKey, resource: Resource) -> ChangeEvent {
        let new = Arc::new(resource);
        let mut inner = write(&self.inner);
        match inner.objects.insert(key.clone(), Arc::clone(&new)) {
            Some(old) => ChangeEvent::Updated { key, old, new },
            None => ChangeEvent::Added { key, resource: new },
        }
    }

    /// Remove `key`, returning the last cached snapshot if there was one.
    pub fn delete(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        write(&self.inner).objects.remove(key)
    }

    /// Copy out the current snapshot for `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        read(&self.inner).objects.get(key).cloned()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        read(&self.inner).objects.contains_key(key)
    }

    /// Replace every object of `kind` with a fresh listing.
    ///
    /// Applied under one write lock. Yields one event per listed object plus a `Deleted` event
    /// for each cached object of that kind missing from the listing. Marks the cache synced.
    pub fn replace(
        &self,
        kind: ResourceKind,
        items: Vec<(ResourceKey, Resource)>,
    ) -> Vec<ChangeEvent> {
        let mut events = Vec::with_capacity(items.len());
        {
            let mut inner = write(&self.inner);
            let listed: HashSet<ResourceKey> = items.iter().map(|(k, _)| k.clone()).collect();

            let stale: Vec<ResourceKey> = inner
                .objects
                .keys()
                .filter(|k| k.kind() == kind && !listed.contains(*k))
                .cloned()
                .collect();
            for key in stale {
                if let Some(last) = inner.objects.remove(&key) {
                    events.push(ChangeEvent::Deleted { key, last });
                }
            }

            for (key, resource) in items {
                let new = Arc::new(resource);
                let event = match inner.objects.insert(key.clone(), Arc::clone(&new)) {
                    Some(old) => ChangeEvent::Updated { key, old, new },
                    None => ChangeEvent::Added { key, resource: new },
                };
                events.push(event);
            }
        }
        self.mark_synced();
        events
    }

    /// Whether the initial full listing has been applied.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    pub fn mark_synced(&self) {
        self.synced.send_if_modified(|synced| !std::mem::replace(synced, true));
    }

    /// Suspend until the cache has synced.
    pub async fn wait_for_sync(&self) {
        let mut rx = self.synced.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|synced| *synced).await;
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        read(&self.inner).objects.keys().cloned().collect()
    }

    pub fn list_by_kind(&self, kind: ResourceKind) -> Vec<Arc<Resource>> {
        read(&self.inner)
            .objects
            .iter()
            .filter(|(k, _)| k.kind() == kind)
            .map(|(_, v)| Arc::clone(v))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.inner).objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view that shares this cache's storage but cannot write to it.
    pub fn reader(&self) -> CacheReader {
        CacheReader(self.clone())
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle to a [`ResourceCache`].
#[derive(Clone)]
pub struct CacheReader(ResourceCache);

impl CacheReader {
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Resource>> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.0.contains(key)
    }

    pub fn has_synced(&self) -> bool {
        self.0.has_synced()
    }

    pub async fn wait_for_sync(&self) {
        self.0.wait_for_sync().await
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.0.keys()
    }

    pub fn list_by_kind(&self, kind: ResourceKind) -> Vec<Arc<Resource>> {
        self.0.list_by_kind(kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

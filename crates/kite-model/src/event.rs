use std::sync::Arc;

use crate::{Resource, ResourceKey};

/// A change observed in the watched collection, as applied to the cache.
///
/// Snapshots are shared, immutable handles: the cache replaces its own entry on the next write
/// and never mutates one that has been handed out.
#[derive(Clone, Debug)]
pub enum ChangeEvent {
    Added {
        key: ResourceKey,
        resource: Arc<Resource>,
    },
    Updated {
        key: ResourceKey,
        old: Arc<Resource>,
        new: Arc<Resource>,
    },
    Deleted {
        key: ResourceKey,
        last: Arc<Resource>,
    },
}

impl ChangeEvent {
    pub fn key(&self) -> &ResourceKey {
        match self {
            ChangeEvent::Added { key, .. }
            | ChangeEvent::Updated { key, .. }
            | ChangeEvent::Deleted { key, .. } => key,
        }
    }

    /// Short label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::Added { .. } => "added",
            ChangeEvent::Updated { .. } => "updated",
            ChangeEvent::Deleted { .. } => "deleted",
        }
    }

    /// The most recent state carried by the event.
    pub fn latest(&self) -> &Arc<Resource> {
        match self {
            ChangeEvent::Added { resource, .. } => resource,
            ChangeEvent::Updated { new, .. } => new,
            ChangeEvent::Deleted { last, .. } => last,
        }
    }
}

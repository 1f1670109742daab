//! Watch-side plumbing: the source abstraction and the dispatcher that mirrors it into the
//! cache and feeds the change queue.

mod dispatcher;
pub use dispatcher::{DispatchConfig, WatchDispatcher};

mod memory;
pub use memory::MemorySource;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use kite_model::{Resource, ResourceKind, ResourceVersion};

/// Full listing of the watched collection.
#[derive(Debug, Clone, Default)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    /// Version to resume watching from.
    pub resource_version: ResourceVersion,
}

/// Notification yielded by a watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(Resource),
    Modified(Resource),
    Deleted(Resource),
    /// Progress marker: no object changed, but the stream has reached this version.
    Bookmark(ResourceVersion),
}

impl WatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Deleted(_) => "deleted",
            WatchEvent::Bookmark(_) => "bookmark",
        }
    }

    /// Version carried by the event, if any.
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            WatchEvent::Added(r) | WatchEvent::Modified(r) | WatchEvent::Deleted(r) => {
                r.resource_version()
            }
            WatchEvent::Bookmark(rv) => Some(rv.as_str()),
        }
    }
}

pub type WatchStream = BoxStream<'static, Result<WatchEvent, WatchError>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("failed to reach watch source: {0}")]
    Connect(String),
    #[error("watch source rejected credentials: {0}")]
    Unauthorized(String),
    #[error("resource version expired; relist required")]
    Expired,
    #[error("watch source returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("failed to decode watch payload: {0}")]
    Decode(String),
    #[error("watch stream closed")]
    Closed,
}

impl WatchError {
    /// Errors after which the dispatcher relists immediately instead of backing off.
    pub fn relist_now(&self) -> bool {
        matches!(self, WatchError::Expired | WatchError::Closed)
    }
}

/// A remote collection that can be listed and watched by one selector.
///
/// The stream returned by [`WatchSource::watch`] may end or fail at any time; the dispatcher
/// treats both as a cue to relist.
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Kind of every object this source yields.
    fn kind(&self) -> ResourceKind;

    async fn list(&self) -> Result<ResourceList, WatchError>;

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, WatchError>;
}

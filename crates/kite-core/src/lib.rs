pub mod error;
pub use error::{CoreError, ReconcileError};

pub mod cache;
pub use cache::{CacheReader, ResourceCache};

pub mod queue;
pub use queue::{BackoffConfig, BucketConfig, ChangeQueue, RateLimiter};

pub mod watch;
pub use watch::{
    DispatchConfig, MemorySource, ResourceList, WatchDispatcher, WatchError, WatchEvent,
    WatchSource, WatchStream,
};

pub mod reconciler;
pub use reconciler::{Reconciler, ReconcilerRouter};

pub mod worker;
pub use worker::ReconcileWorker;

pub mod controller;
pub use controller::{Controller, ControllerBuilder, ControllerConfig};

mod sink;
pub use sink::{DiscardSink, FailureReport, FailureSink};

mod metrics;
pub use metrics::{ControllerMetrics, NoopMetrics, ReconcileOutcome};

pub(crate) mod sync;

//! Prometheus metrics backend for the kite controller.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`kite_core::ControllerMetrics`]
//! that records queue, reconcile and watch activity in its own [`Registry`].
//!
//! ## Example
//! ```rust,ignore
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let controller = Controller::builder(source, reconciler)
//!     .with_metrics(metrics.clone())
//!     .build()?;
//!
//! // Later, from whatever serves /metrics:
//! let body = metrics.encode_text()?;
//! ```
//!
//! ## Metrics
//! - `kite_queue_adds_total` - Counter
//! - `kite_queue_depth` - Gauge
//! - `kite_queue_retries_total` - Counter
//! - `kite_reconcile_total{outcome}` - Counter
//! - `kite_reconcile_duration_seconds{outcome}` - Histogram
//! - `kite_watch_events_total{event}` - Counter
//! - `kite_watch_restarts_total` - Counter
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics` endpoint.

mod backend;
pub use backend::PrometheusMetrics;

mod error;
pub use error::MetricsError;

pub use prometheus::{Encoder, Registry, TextEncoder};

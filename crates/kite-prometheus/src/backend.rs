use std::{sync::Arc, time::Duration};

use kite_core::{ControllerMetrics, ReconcileOutcome};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, core::Collector,
};

use crate::error::MetricsError;

/// [`ControllerMetrics`] backed by a private Prometheus registry.
///
/// Cloning shares the underlying collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Arc<Registry>,
    queue_adds: IntCounter,
    queue_depth: IntGauge,
    queue_retries: IntCounter,
    reconciles: IntCounterVec,
    reconcile_duration: HistogramVec,
    watch_events: IntCounterVec,
    watch_restarts: IntCounter,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register every collector in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let queue_adds = register(
            &registry,
            IntCounter::new("kite_queue_adds_total", "Keys newly enqueued")?,
        )?;
        let queue_depth = register(
            &registry,
            IntGauge::new("kite_queue_depth", "Keys ready for a worker")?,
        )?;
        let queue_retries = register(
            &registry,
            IntCounter::new("kite_queue_retries_total", "Rate-limited retries scheduled")?,
        )?;
        let reconciles = register(
            &registry,
            IntCounterVec::new(
                Opts::new("kite_reconcile_total", "Reconcile passes by outcome"),
                &["outcome"],
            )?,
        )?;
        let reconcile_duration = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "kite_reconcile_duration_seconds",
                    "Time spent per reconcile pass",
                )
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
                &["outcome"],
            )?,
        )?;
        let watch_events = register(
            &registry,
            IntCounterVec::new(
                Opts::new("kite_watch_events_total", "Watch notifications by type"),
                &["event"],
            )?,
        )?;
        let watch_restarts = register(
            &registry,
            IntCounter::new("kite_watch_restarts_total", "List/watch restarts")?,
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            queue_adds,
            queue_depth,
            queue_retries,
            reconciles,
            reconcile_duration,
            watch_events,
            watch_restarts,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

fn register<C>(registry: &Registry, collector: C) -> Result<C, MetricsError>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl ControllerMetrics for PrometheusMetrics {
    fn queue_added(&self) {
        self.queue_adds.inc();
    }

    fn queue_depth(&self, depth: usize) {
        self.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    fn queue_retried(&self) {
        self.queue_retries.inc();
    }

    fn reconciled(&self, outcome: ReconcileOutcome, elapsed: Duration) {
        let label = [outcome.as_str()];
        self.reconciles.with_label_values(&label).inc();
        self.reconcile_duration
            .with_label_values(&label)
            .observe(elapsed.as_secs_f64());
    }

    fn watch_event(&self, event: &'static str) {
        self.watch_events.with_label_values(&[event]).inc();
    }

    fn watch_restarted(&self) {
        self.watch_restarts.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_renders() {
        let m = PrometheusMetrics::new().unwrap();
        m.queue_added();
        m.queue_depth(3);
        m.reconciled(ReconcileOutcome::Retry, Duration::from_millis(20));
        m.reconciled(ReconcileOutcome::Success, Duration::from_millis(2));
        m.watch_event("added");
        m.watch_restarted();

        let text = m.encode_text().unwrap();
        assert!(text.contains("kite_queue_adds_total 1"));
        assert!(text.contains("kite_queue_depth 3"));
        assert!(text.contains(r#"kite_reconcile_total{outcome="retry"} 1"#));
        assert!(text.contains(r#"kite_watch_events_total{event="added"} 1"#));
        assert!(text.contains("kite_watch_restarts_total 1"));
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let registry = Registry::new();
        let _first = PrometheusMetrics::with_registry(registry.clone()).unwrap();
        assert!(matches!(
            PrometheusMetrics::with_registry(registry),
            Err(MetricsError::Prometheus(_))
        ));
    }

    #[test]
    fn clones_share_collectors() {
        let m = PrometheusMetrics::new().unwrap();
        m.clone().queue_retried();
        assert_eq!(m.queue_retries.get(), 1);
    }
}

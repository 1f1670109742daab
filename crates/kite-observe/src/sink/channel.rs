use std::sync::atomic::{AtomicU64, Ordering};

use kite_core::{FailureReport, FailureSink};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Forwards reports to a bounded channel.
///
/// Never blocks the worker: when the channel is full or closed the report is dropped and
/// counted.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<FailureReport>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FailureReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Reports lost to overflow or a closed receiver.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FailureSink for ChannelSink {
    fn report(&self, report: &FailureReport) {
        match self.tx.try_send(report.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(r)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %r.key, "failure channel full; report dropped");
            }
            Err(TrySendError::Closed(r)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %r.key, "failure channel closed; report dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_core::ReconcileError;
    use kite_model::{ResourceKey, ResourceKind};

    fn report(name: &str) -> FailureReport {
        FailureReport {
            key: ResourceKey::new(ResourceKind::Pod, "default", name),
            error: ReconcileError::transient("unavailable"),
            attempts: 5,
        }
    }

    #[tokio::test]
    async fn delivers_until_full_then_counts_drops() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.report(&report("a"));
        sink.report(&report("b"));

        assert_eq!(rx.recv().await.unwrap().key.name(), "a");
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn closed_receiver_is_not_fatal() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);
        sink.report(&report("a"));
        assert_eq!(sink.dropped(), 1);
    }
}

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use kite_model::{ObjectMeta, Pod, Resource, ResourceKind};

use super::*;

#[derive(Clone, Copy)]
enum Mode {
    Succeed,
    Transient,
    Permanent,
    Panic,
    Hang,
}

struct Scripted {
    mode: Mode,
    calls: AtomicUsize,
    absent: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Scripted {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            absent: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Reconciler for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn reconcile(
        &self,
        _key: &ResourceKey,
        _resource: &Resource,
        cancel: CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Succeed => Ok(()),
            Mode::Transient => Err(ReconcileError::transient("downstream unavailable")),
            Mode::Permanent => Err(ReconcileError::permanent("malformed object")),
            Mode::Panic => panic!("reconciler blew up"),
            Mode::Hang => {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn absent(&self, _key: &ResourceKey, _cancel: CancellationToken) {
        self.absent.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Collecting(Mutex<Vec<FailureReport>>);

impl FailureSink for Collecting {
    fn report(&self, report: &FailureReport) {
        self.0.lock().unwrap().push(report.clone());
    }
}

struct Exploding;

impl FailureSink for Exploding {
    fn report(&self, _report: &FailureReport) {
        panic!("sink blew up");
    }
}

fn key() -> ResourceKey {
    ResourceKey::new(ResourceKind::Pod, "default", "wr-manager-0")
}

fn cached() -> ResourceCache {
    let cache = ResourceCache::new();
    cache.upsert(
        key(),
        Resource::Pod(Pod {
            metadata: ObjectMeta::named("default", "wr-manager-0"),
            ..Default::default()
        }),
    );
    cache
}

async fn pass(worker: &ReconcileWorker, queue: &ChangeQueue) -> ReconcileOutcome {
    let k = queue.get().await.unwrap();
    worker.process(k, &CancellationToken::new()).await
}

#[tokio::test(start_paused = true)]
async fn success_clears_retry_history() {
    let queue = ChangeQueue::with_default_limiter();
    let rec = Scripted::new(Mode::Succeed);
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), rec.clone());

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Success);
    assert_eq!(rec.calls.load(Ordering::SeqCst), 1);
    assert_eq!(queue.num_requeues(&key()), 0);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_key_is_handled_as_absent() {
    let queue = ChangeQueue::with_default_limiter();
    let rec = Scripted::new(Mode::Succeed);
    let worker = ReconcileWorker::new(0, queue.clone(), ResourceCache::new(), rec.clone());

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Absent);
    assert_eq!(rec.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rec.absent.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_stop_at_ceiling_with_one_report() {
    let queue = ChangeQueue::with_default_limiter();
    let sink = Arc::new(Collecting::default());
    let rec = Scripted::new(Mode::Transient);
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), rec.clone())
        .with_sink(sink.clone())
        .with_retry_ceiling(5);

    queue.add(key());
    for _ in 0..5 {
        assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Retry);
    }
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Dropped);
    assert_eq!(rec.calls.load(Ordering::SeqCst), 6);

    let reports = sink.0.lock().unwrap().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].attempts, 6);
    assert_eq!(reports[0].key, key());
    assert_eq!(queue.num_requeues(&key()), 0);
    assert_eq!(queue.delayed(), 0);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_ceiling_drops_on_first_transient_failure() {
    let queue = ChangeQueue::with_default_limiter();
    let sink = Arc::new(Collecting::default());
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), Scripted::new(Mode::Transient))
        .with_sink(sink.clone())
        .with_retry_ceiling(0);

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Dropped);
    let reports = sink.0.lock().unwrap().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_reported_without_retry() {
    let queue = ChangeQueue::with_default_limiter();
    let sink = Arc::new(Collecting::default());
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), Scripted::new(Mode::Permanent))
        .with_sink(sink.clone());

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Dropped);

    let reports = sink.0.lock().unwrap().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].attempts, 1);
    assert!(reports[0].error.is_permanent());
    assert_eq!(queue.delayed(), 0);
}

#[tokio::test(start_paused = true)]
async fn panic_is_contained_and_retried() {
    let queue = ChangeQueue::with_default_limiter();
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), Scripted::new(Mode::Panic));

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Retry);
    assert_eq!(queue.num_requeues(&key()), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_call_and_retries() {
    let queue = ChangeQueue::with_default_limiter();
    let rec = Scripted::new(Mode::Hang);
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), rec.clone())
        .with_reconcile_timeout(Some(Duration::from_secs(1)));

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Retry);
    assert_eq!(rec.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_sink_does_not_take_down_worker() {
    let queue = ChangeQueue::with_default_limiter();
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), Scripted::new(Mode::Permanent))
        .with_sink(Arc::new(Exploding));

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Dropped);

    queue.add(key());
    assert_eq!(pass(&worker, &queue).await, ReconcileOutcome::Dropped);
}

#[tokio::test(start_paused = true)]
async fn run_exits_on_queue_shutdown() {
    let queue = ChangeQueue::with_default_limiter();
    let rec = Scripted::new(Mode::Succeed);
    let worker = ReconcileWorker::new(0, queue.clone(), cached(), rec.clone());
    let task = tokio::spawn(worker.run(CancellationToken::new()));

    queue.add(key());
    while rec.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    queue.shutdown();
    task.await.unwrap();
}

use std::time::Instant;

use kite_model::{ObjectMeta, Pod, ResourceKind};

use super::*;

fn key() -> ResourceKey {
    ResourceKey::new(ResourceKind::Pod, "wr", "wr-manager-0")
}

fn pod() -> Resource {
    let mut meta = ObjectMeta::named("wr", "wr-manager-0");
    meta.resource_version = Some("42".into());
    Resource::Pod(Pod {
        metadata: meta,
        ..Default::default()
    })
}

async fn reconcile(cfg: ExecConfig) -> Result<(), ReconcileError> {
    ExecReconciler::new(cfg)
        .reconcile(&key(), &pod(), CancellationToken::new())
        .await
}

#[tokio::test]
async fn zero_exit_succeeds() {
    reconcile(ExecConfig::shell("exit 0")).await.unwrap();
}

#[tokio::test]
async fn key_and_object_are_exported() {
    let script = r#"
        test "$KITE_KEY" = "pods/wr/wr-manager-0" || exit 11
        test "$KITE_KIND" = "Pod" || exit 12
        test "$KITE_NAMESPACE" = "wr" || exit 13
        test "$KITE_NAME" = "wr-manager-0" || exit 14
        test "$KITE_EVENT" = "present" || exit 15
        test "$KITE_RESOURCE_VERSION" = "42" || exit 16
        case "$KITE_OBJECT" in *'"name":"wr-manager-0"'*) ;; *) exit 17 ;; esac
    "#;
    reconcile(ExecConfig::shell(script)).await.unwrap();
}

#[tokio::test]
async fn nonzero_exit_is_transient() {
    let err = reconcile(ExecConfig::shell("exit 3")).await.unwrap_err();
    assert!(!err.is_permanent());
    assert!(err.reason().contains("3"));
}

#[tokio::test]
async fn listed_exit_code_is_permanent() {
    let err = reconcile(ExecConfig::shell("exit 64").with_permanent_exit_codes([64]))
        .await
        .unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn missing_program_is_permanent() {
    let err = reconcile(ExecConfig::program("/nonexistent/kite-hook"))
        .await
        .unwrap_err();
    assert!(err.is_permanent());

    let err = reconcile(ExecConfig::default()).await.unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn absent_hook_sees_absent_event() {
    let rec = ExecReconciler::new(ExecConfig::shell(
        r#"test "$KITE_EVENT" = "absent" && test -z "$KITE_OBJECT""#,
    ));
    rec.run(&key(), HookEvent::Absent, None, CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn absent_hook_can_be_disabled() {
    let rec = ExecReconciler::new(ExecConfig::program("/nonexistent/kite-hook").with_run_on_absent(false));
    // Would log a failure if it ran; completes either way.
    rec.absent(&key(), CancellationToken::new()).await;
    assert!(!rec.config().run_on_absent);
}

#[tokio::test]
async fn cancellation_terminates_child() {
    let rec = ExecReconciler::new(ExecConfig::shell("sleep 30"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = rec
        .run(&key(), HookEvent::Present, Some(&pod()), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn cancellation_reaches_hook_whose_output_outlives_it() {
    // `sleep` inherits stdout, so the pipe stays open after the shell exits.
    let rec = ExecReconciler::new(ExecConfig::shell("sleep 5 & exit 0"));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let res = rec
        .run(&key(), HookEvent::Present, Some(&pod()), cancel)
        .await;
    assert!(matches!(res, Err(ExecError::Cancelled)), "got {res:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn signal_death_is_transient() {
    let err = reconcile(ExecConfig::shell("kill -9 $$")).await.unwrap_err();
    assert!(!err.is_permanent());
    assert!(err.reason().contains("signal"));
}

mod config;
mod pod_status;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kite_core::{Controller, ControllerMetrics, Reconciler, ReconcilerRouter};
use kite_exec::{ExecConfig, ExecReconciler};
use kite_observe::{LogSink, logger_init};
use kite_prometheus::PrometheusMetrics;
use kite_watch::HttpSource;

use crate::{config::AgentConfig, pod_status::PodStatusReconciler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Configuration + logger
    let cfg = AgentConfig::from_env()?;
    logger_init(&cfg.logger)?;
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(host = %host, kind = %cfg.kind, selector = %cfg.selector, "kite-agentd starting");

    // 2) Watch source; auth and connectivity problems are fatal here
    let watch = cfg.watch()?;
    let endpoint = watch.endpoint.clone();
    let source = HttpSource::connect(watch)
        .await
        .with_context(|| format!("connect to {endpoint}"))?;
    info!(endpoint = %endpoint, "api server reachable");

    // 3) Reconciler
    let reconciler: Arc<dyn Reconciler> = match &cfg.hook {
        Some(hook) => {
            let exec = ExecConfig::shell(hook.clone())
                .with_permanent_exit_codes(cfg.hook_permanent_codes.iter().copied());
            info!(hook = %hook, "reconciling through hook");
            Arc::new(ExecReconciler::new(exec))
        }
        None => {
            info!("no hook configured; reporting pod init state");
            Arc::new(PodStatusReconciler)
        }
    };
    let router = ReconcilerRouter::new().route(cfg.kind, reconciler);

    // 4) Controller
    let metrics = if cfg.metrics {
        Some(PrometheusMetrics::new()?)
    } else {
        None
    };
    let mut builder = Controller::builder(Arc::new(source), Arc::new(router))
        .with_config(cfg.controller.clone())
        .with_sink(Arc::new(LogSink::new()));
    if let Some(m) = &metrics {
        builder = builder.with_metrics(Arc::new(m.clone()) as Arc<dyn ControllerMetrics>);
    }
    let controller = builder.build()?;
    info!(workers = cfg.controller.workers, "controller ready");

    // 5) Run until Ctrl+C or SIGTERM
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));
    info!("press Ctrl+C to stop");

    controller.run(cancel).await?;

    if let Some(m) = metrics {
        match m.encode_text() {
            Ok(text) => debug!("final metrics:\n{text}"),
            Err(e) => warn!(error = %e, "failed to encode metrics"),
        }
    }
    info!("kite-agentd stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                    _ = term.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler; Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received");
    }
    info!("shutting down...");
    cancel.cancel();
}

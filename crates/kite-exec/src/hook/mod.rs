//! Reconciler that delegates each pass to an external command.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use kite_core::{ReconcileError, Reconciler};
use kite_model::{Resource, ResourceKey};

use crate::{
    config::ExecConfig,
    error::ExecError,
    util::{cmd_program, kill_graceful},
};

/// Why the hook is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Present,
    Absent,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Present => "present",
            HookEvent::Absent => "absent",
        }
    }
}

/// Runs the configured command for every reconcile pass.
///
/// The command sees the key in its environment:
/// `KITE_KEY`, `KITE_KIND`, `KITE_NAMESPACE`, `KITE_NAME`, `KITE_EVENT` (`present`/`absent`),
/// plus `KITE_RESOURCE_VERSION` and `KITE_OBJECT` (JSON) when the object exists.
///
/// Exit status mapping: `0` succeeds, codes listed in
/// [`ExecConfig::permanent_exit_codes`] fail permanently, anything else is transient.
/// A missing or unspawnable program fails permanently.
pub struct ExecReconciler {
    name: &'static str,
    cfg: ExecConfig,
}

impl ExecReconciler {
    pub fn new(cfg: ExecConfig) -> Self {
        Self { name: "exec", cfg }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn config(&self) -> &ExecConfig {
        &self.cfg
    }

    /// Spawn the command for `key` and wait for it, killing it if `cancel` fires.
    pub async fn run(
        &self,
        key: &ResourceKey,
        event: HookEvent,
        object: Option<&Resource>,
        cancel: CancellationToken,
    ) -> Result<(), ExecError> {
        let program = &self.cfg.program;
        if program.trim().is_empty() {
            return Err(ExecError::MissingProgram(program.clone()));
        }

        let mut cmd = cmd_program(&self.cfg);
        cmd.env("KITE_KEY", key.to_string())
            .env("KITE_KIND", key.kind().as_str())
            .env("KITE_NAMESPACE", key.namespace().unwrap_or(""))
            .env("KITE_NAME", key.name())
            .env("KITE_EVENT", event.as_str());
        if let Some(obj) = object {
            let json = serde_json::to_string(obj)?;
            cmd.env("KITE_RESOURCE_VERSION", obj.resource_version().unwrap_or(""))
                .env("KITE_OBJECT", json);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        trace!(%program, args = ?self.cfg.args, "spawn");
        let mut child = cmd.spawn().map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ExecError::MissingProgram(program.clone()),
            _ => ExecError::Spawn {
                program: program.clone(),
                source,
            },
        })?;

        let read_stdout = child.stdout.take().map(|stdout| {
            let mut lines = BufReader::new(stdout).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "kite.exec.out", %line);
                }
            })
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                debug!("cancelled; stopping hook");
                let grace = Duration::from_millis(self.cfg.kill_grace_ms);
                if let Err(e) = kill_graceful(&mut child, grace).await {
                    warn!(error = %e, "failed to kill hook");
                }
                if let Some(reader) = read_stdout {
                    reader.abort();
                }
                return Err(ExecError::Cancelled);
            }
        };

        // A background process started by the hook can hold stdout open past the hook's exit.
        if let Some(mut reader) = read_stdout {
            tokio::select! {
                _ = &mut reader => {}
                _ = cancel.cancelled() => {
                    reader.abort();
                    debug!("cancelled while draining hook output");
                    return Err(ExecError::Cancelled);
                }
            }
        }

        if status.success() {
            debug!("hook exited successfully");
            return Ok(());
        }
        let program = program.clone();
        match status.code() {
            Some(code) => Err(ExecError::NonZeroExit { program, code }),
            None => Err(ExecError::KilledBySignal { program }),
        }
    }

    /// Map a hook failure to the controller's retry policy.
    pub fn classify(&self, err: ExecError) -> ReconcileError {
        match err {
            ExecError::NonZeroExit { code, .. } if self.cfg.permanent_exit_codes.contains(&code) => {
                ReconcileError::permanent(format!("hook exited with permanent code {code}"))
            }
            ExecError::Spawn { ref source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                ReconcileError::permanent(err.to_string())
            }
            ExecError::MissingProgram(_) | ExecError::Encode(_) => {
                ReconcileError::permanent(err.to_string())
            }
            other => ReconcileError::transient(format!("hook failed: {other}")),
        }
    }
}

#[async_trait]
impl Reconciler for ExecReconciler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn reconcile(
        &self,
        key: &ResourceKey,
        resource: &Resource,
        cancel: CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.run(key, HookEvent::Present, Some(resource), cancel)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn absent(&self, key: &ResourceKey, cancel: CancellationToken) {
        if !self.cfg.run_on_absent {
            return;
        }
        if let Err(e) = self.run(key, HookEvent::Absent, None, cancel).await {
            warn!(key = %key, error = %e, "absence hook failed");
        }
    }
}

#[cfg(all(test, unix))]
mod tests;

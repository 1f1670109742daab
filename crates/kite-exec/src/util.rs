use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::ExecConfig;

pub(crate) fn cmd_program(cfg: &ExecConfig) -> Command {
    let mut cmd = Command::new(&cfg.program);
    cmd.args(cfg.args.iter().map(|s| s.as_str()));
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        cmd.env(k, v);
    }
    cmd
}

/// Ask the child to stop with SIGTERM, then SIGKILL it if it is still running after `grace`.
#[cfg(target_family = "unix")]
pub(crate) async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if let Some(id) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) {
        // SAFETY: `kill` has no memory-safety preconditions; `id` is our own unreaped child.
        unsafe {
            libc::kill(id, libc::SIGTERM);
        }
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return Ok(());
        }
    }
    child.kill().await
}

#[cfg(target_family = "windows")]
pub(crate) async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    child.kill().await
}

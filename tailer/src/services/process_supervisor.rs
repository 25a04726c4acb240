//! Process supervisor service
//!
//! Spawns the tailed command in its working directory with piped stdout and
//! stderr. The supervisor never signals the child on its own; a kill only
//! happens when the caller fires the returned [`ChildTerminator`].

use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use shared::{Component, component_debug, component_warn};

use crate::config::CommandSpec;
use crate::error::{TailerError, TailerResult};
use crate::traits::{ChildHandles, ChildTerminator, ProcessSupervisor};
use crate::types::{ChildExit, StreamKind};

/// Real process supervisor implementation
#[derive(Debug, Clone, Default)]
pub struct RealProcessSupervisor;

impl RealProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());
        cmd
    }

    /// Wait for the child, killing it first if a terminate request arrives
    async fn watch_exit(mut child: Child, kill_rx: oneshot::Receiver<()>) -> ChildExit {
        let status = tokio::select! {
            status = child.wait() => status,
            Ok(()) = kill_rx => {
                component_debug!(Component::Supervisor, "🔪 Killing child process");
                if let Err(e) = child.start_kill() {
                    component_warn!(Component::Supervisor, "Failed to kill child process: {}", e);
                }
                child.wait().await
            }
        };
        ChildExit::from(status)
    }
}

impl ProcessSupervisor for RealProcessSupervisor {
    fn start(&self, spec: &CommandSpec) -> TailerResult<ChildHandles> {
        let mut child = Self::build_command(spec)
            .spawn()
            .map_err(|source| TailerError::SpawnFailed {
                program: spec.program.clone(),
                working_dir: spec.working_dir.clone(),
                source,
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            (stdout, _) => {
                let _ = child.start_kill();
                let stream = if stdout.is_none() { StreamKind::Stdout } else { StreamKind::Stderr };
                return Err(TailerError::PipeUnavailable { stream });
            }
        };
        let pid = child.id();

        // The watcher owns the child so exit status is collected exactly once.
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let exit = Self::watch_exit(child, kill_rx).await;
            let _ = exit_tx.send(exit);
        });

        component_debug!(
            Component::Supervisor,
            "Spawned '{}' {:?} (PID: {:?}) in {}",
            spec.program,
            spec.args,
            pid,
            spec.working_dir.display()
        );

        Ok(ChildHandles {
            pid,
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit: Box::pin(async move { exit_rx.await.unwrap_or(ChildExit::Lost) }),
            terminator: ChildTerminator::new(kill_tx),
        })
    }
}

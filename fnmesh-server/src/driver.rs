//! Reference [`ContainerDriver`]: runs `route.image` as a local subprocess.
//! Container image building and the network protocol for container I/O are
//! explicit Non-goals; this driver exists so the server is runnable
//! end-to-end without a container runtime, treating `image` as a command
//! line the way a local dev harness would.

use fnmesh_pool::{ContainerDriver, ExecOutcome};
use fnmesh_store::ExecConfig;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub struct ProcessDriver {
    max_stdout_bytes: usize,
}

impl ProcessDriver {
    pub fn new(max_stdout_bytes: usize) -> Self {
        ProcessDriver { max_stdout_bytes }
    }
}

#[async_trait::async_trait]
impl ContainerDriver for ProcessDriver {
    async fn run(&self, config: &ExecConfig, cancel: CancellationToken) -> ExecOutcome {
        let mut parts = config.image.split_whitespace();
        let Some(program) = parts.next() else {
            return ExecOutcome::error("empty image command");
        };

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return ExecOutcome::error(format!("failed to start image: {err}")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&config.stdin).await;
        }

        let mut stdout_handle = child.stdout.take();

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                ExecOutcome::timeout()
            }
            status = child.wait() => {
                match status {
                    Ok(status) => {
                        let mut stdout = Vec::new();
                        if let Some(mut out) = stdout_handle.take() {
                            let _ = out.read_to_end(&mut stdout).await;
                        }
                        if status.success() && stdout.len() > self.max_stdout_bytes {
                            ExecOutcome::error(format!(
                                "stdout of {} bytes exceeded the {} byte limit",
                                stdout.len(),
                                self.max_stdout_bytes
                            ))
                        } else if status.success() {
                            ExecOutcome::success(stdout)
                        } else {
                            ExecOutcome::error(format!("image exited with status {status}"))
                        }
                    }
                    Err(err) => ExecOutcome::error(format!("failed to run image: {err}")),
                }
            }
        }
    }
}

//! Real process runner using `tokio::process::Command`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::contract::{CommandSpec, ProcessOutput, ProcessRunner};

/// Runs commands as child processes, capturing stdout/stderr, honouring the
/// command's timeout and cancellation token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        // Drain pipes concurrently so a chatty process can't block on a full pipe.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                if let Err(e) = pipe.read_to_end(&mut buf).await {
                    debug!(error = %e, captured_bytes = buf.len(), "stdout read failed, output truncated");
                }
            }
            buf
        });
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                if let Err(e) = pipe.read_to_end(&mut buf).await {
                    debug!(error = %e, captured_bytes = buf.len(), "stderr read failed, output truncated");
                }
            }
            buf
        });

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                let stdout = stdout_handle.await.unwrap_or_default();
                let stderr = stderr_handle.await.unwrap_or_default();
                debug!(program = %spec.program, exit_code = ?status.code(), "process completed");
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    timed_out: false,
                    interrupted: false,
                })
            }
            () = tokio::time::sleep(spec.timeout) => {
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                warn!(program = %spec.program, timeout_secs = spec.timeout.as_secs(), "process timed out");
                Ok(ProcessOutput {
                    exit_code: None,
                    stderr: "process timed out".into(),
                    timed_out: true,
                    ..ProcessOutput::default()
                })
            }
            () = spec.cancellation.cancelled() => {
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                debug!(program = %spec.program, "process cancelled");
                Ok(ProcessOutput {
                    exit_code: None,
                    stderr: "process cancelled".into(),
                    interrupted: true,
                    ..ProcessOutput::default()
                })
            }
        }
    }
}

use std::{
    ffi::OsString,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};

use tokio::{process::Command, time::timeout};
use tracing::{debug, warn};

/// How an external tool invocation ended. Exit status is recorded for logging
/// only; callers judge success by the artifacts the tool left behind.
#[derive(Debug)]
pub(super) enum ToolOutcome {
    Exited(ExitStatus),
    TimedOut,
    SpawnFailed(io::Error),
}

/// Run `program` in `cwd`, killing it if it outlives `limit`.
pub(super) async fn run_tool(
    program: &Path,
    args: &[OsString],
    cwd: &Path,
    limit: Duration,
) -> ToolOutcome {
    let started_at = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(
                target = "application::render::toolchain",
                op = "toolchain::run_tool",
                result = "spawn_failed",
                program = %program.display(),
                error = %err,
                "Failed to spawn external tool"
            );
            return ToolOutcome::SpawnFailed(err);
        }
    };

    match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            debug!(
                target = "application::render::toolchain",
                op = "toolchain::run_tool",
                result = "exited",
                program = %program.display(),
                exit_code = ?output.status.code(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr_bytes = output.stderr.len(),
                "External tool exited"
            );
            ToolOutcome::Exited(output.status)
        }
        Ok(Err(err)) => {
            warn!(
                target = "application::render::toolchain",
                op = "toolchain::run_tool",
                result = "wait_failed",
                program = %program.display(),
                error = %err,
                "Failed to collect external tool output"
            );
            ToolOutcome::SpawnFailed(err)
        }
        Err(_) => {
            warn!(
                target = "application::render::toolchain",
                op = "toolchain::run_tool",
                result = "timeout",
                program = %program.display(),
                timeout_ms = limit.as_millis() as u64,
                "External tool timed out and was killed"
            );
            ToolOutcome::TimedOut
        }
    }
}

//! ProtocExecutor: spawns the `protoc` subprocess, pumps its stdout/stderr
//! to the log, and reports a pass/fail boolean plus wall-clock duration.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::invocation::ProtocInvocation;

/// The result of one `protoc` subprocess run. `protoc` exiting non-zero is
/// reported here as `succeeded = false`, never as an `Err` — only spawn
/// failure or interruption is a [`Error::Subprocess`].
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub stdout_line_count: usize,
    pub stderr_line_count: usize,
}

/// Runs `protoc @<argsFile>` with the current process's environment merged
/// with `invocation.environment` (additive only, never removing inherited
/// entries).
#[instrument(level = "debug", skip(invocation))]
pub fn execute(invocation: &ProtocInvocation) -> Result<ExecutionReport> {
    let started = Instant::now();

    let mut command = Command::new(&invocation.protoc_path);
    command
        .arg(format!("@{}", invocation.argument_file_path.display()))
        .envs(&invocation.environment)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| Error::subprocess(format!("failed to spawn {}: {e}", invocation.protoc_path.display())))?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let stdout_pump = std::thread::spawn(move || pump_lines(stdout, false));
    let stderr_pump = std::thread::spawn(move || pump_lines(stderr, true));

    let wait_result = child.wait();

    // Pumps are always joined before we look at the exit code, so logs are
    // flushed in order before the caller acts on it.
    let stdout_line_count = stdout_pump.join().unwrap_or(0);
    let stderr_line_count = stderr_pump.join().unwrap_or(0);

    let status = match wait_result {
        Ok(status) => status,
        Err(e) => {
            let _ = child.kill();
            return Err(Error::subprocess(format!("protoc process wait failed: {e}")));
        }
    };

    let duration = started.elapsed();
    let exit_code = status.code();
    Ok(ExecutionReport { succeeded: status.success(), exit_code, duration, stdout_line_count, stderr_line_count })
}

fn pump_lines<R: std::io::Read>(reader: R, is_stderr: bool) -> usize {
    let reader = BufReader::new(reader);
    let mut count = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if is_stderr {
            warn!(target: "protoc", "{line}");
        } else {
            info!(target: "protoc", "{line}");
        }
        count += 1;
    }
    count
}

/// Sends a termination signal to a still-running child, used when the
/// orchestrator is cancelled mid-invocation. Interruption is treated as a
/// fatal [`Error::Subprocess`], re-raised to the caller rather than
/// swallowed.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .map_err(|e| Error::subprocess(format!("failed to send SIGTERM to pid {pid}: {e}")))?;
    if !status.success() {
        return Err(Error::subprocess(format!("kill -TERM {pid} exited non-zero")));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn invocation_for(script_path: &std::path::Path, args_path: &std::path::Path) -> ProtocInvocation {
        ProtocInvocation {
            protoc_path: script_path.to_path_buf(),
            fatal_warnings: false,
            arguments: vec![],
            environment: Default::default(),
            import_paths: vec![],
            input_descriptor_files: vec![],
            descriptor_source_files: vec![],
            source_paths: vec![],
            targets: vec![],
            sanctioned_executable_path: None,
            argument_file_path: args_path.to_path_buf(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_zero_is_reported_as_success() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_protoc.sh");
        std::fs::write(&script, "#!/bin/sh\necho hello\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        let args = dir.path().join("args.txt");
        std::fs::write(&args, "--version\n").unwrap();

        let report = execute(&invocation_for(&script, &args)).unwrap();
        assert!(report.succeeded);
        assert_eq!(report.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_reported_as_failure_not_an_error() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_protoc.sh");
        std::fs::write(&script, "#!/bin/sh\necho boom 1>&2\nexit 1\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        let args = dir.path().join("args.txt");
        std::fs::write(&args, "--version\n").unwrap();

        let report = execute(&invocation_for(&script, &args)).unwrap();
        assert!(!report.succeeded);
        assert_eq!(report.exit_code, Some(1));
    }

    #[test]
    fn spawn_failure_of_nonexistent_binary_is_an_error() {
        let missing = PathBuf::from("/definitely/not/a/real/protoc/binary");
        let args = PathBuf::from("/dev/null");
        assert!(execute(&invocation_for(&missing, &args)).is_err());
    }
}

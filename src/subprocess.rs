//! One-shot subprocess execution with timeout support.
//!
//! Used for short-lived helper commands such as `neuron-ls`, which must never
//! hang the caller even when the driver is wedged.

use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Result of a subprocess execution with timeout.
#[derive(Debug)]
pub enum SubprocessResult {
    /// Command completed successfully with output.
    Success(Output),
    /// Command timed out and was sent SIGKILL.
    Timeout,
    /// Command binary does not exist.
    NotFound,
    /// Command failed to spawn for another reason.
    SpawnError,
    /// Command exited with non-zero status.
    Failed(Output),
}

/// Runs a command with a timeout.
///
/// The child is spawned on the calling thread so its pid is known, then a
/// worker thread drains its pipes with `wait_with_output`. If the deadline
/// passes first, the child is killed so it does not outlive the caller.
pub fn run_with_timeout(cmd: &str, args: &[&str], timeout: Duration) -> SubprocessResult {
    let child = match Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SubprocessResult::NotFound,
        Err(_) => return SubprocessResult::SpawnError,
    };
    let pid = child.id();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => {
            if output.status.success() {
                SubprocessResult::Success(output)
            } else {
                SubprocessResult::Failed(output)
            }
        }
        Ok(Err(_)) => SubprocessResult::SpawnError,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::debug!(cmd, pid, ?timeout, "command timed out, killing");
            kill_pid(pid);
            // The worker reaps the child once it dies.
            SubprocessResult::Timeout
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => SubprocessResult::SpawnError,
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_pid(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The pid belongs to
    // a child that has not been reaped yet, so it cannot have been recycled.
    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    impl SubprocessResult {
        fn stdout_string(&self) -> Option<String> {
            match self {
                Self::Success(output) | Self::Failed(output) => {
                    Some(String::from_utf8_lossy(&output.stdout).to_string())
                }
                _ => None,
            }
        }

        fn is_success(&self) -> bool {
            matches!(self, Self::Success(_))
        }

        fn is_timeout(&self) -> bool {
            matches!(self, Self::Timeout)
        }
    }

    #[test]
    fn test_successful_command() {
        let result = run_with_timeout("echo", &["hello"], Duration::from_secs(1));
        assert!(result.is_success());
        assert_eq!(result.stdout_string().unwrap().trim(), "hello");
    }

    #[test]
    fn test_timeout_kills_slow_command() {
        let start = Instant::now();
        let result = run_with_timeout("sleep", &["10"], Duration::from_millis(100));
        let elapsed = start.elapsed();

        assert!(result.is_timeout());
        assert!(elapsed < Duration::from_secs(1), "Should timeout quickly, took {:?}", elapsed);
    }

    #[test]
    fn test_nonexistent_command() {
        let result = run_with_timeout(
            "this_command_does_not_exist_12345",
            &[],
            Duration::from_secs(1),
        );
        assert!(matches!(result, SubprocessResult::NotFound));
        assert!(result.stdout_string().is_none());
    }

    #[test]
    fn test_failed_command_keeps_stdout() {
        let result = run_with_timeout("sh", &["-c", "echo partial; exit 3"], Duration::from_secs(1));
        assert!(matches!(result, SubprocessResult::Failed(_)));
        assert_eq!(result.stdout_string().unwrap().trim(), "partial");
    }

    #[test]
    fn test_multiple_rapid_timeouts() {
        for _ in 0..5 {
            let result = run_with_timeout("sleep", &["10"], Duration::from_millis(20));
            assert!(result.is_timeout());
        }
    }
}

//! Ownership of the streaming `neuron-monitor` child process.
//!
//! [`MonitorProcess`] spawns the tool with `-c <config>`, hands out its
//! stdout once, and guarantees the child is terminated and reaped: either
//! through [`stop`](MonitorProcess::stop) or, failing that, on drop.

use crate::error::{MonitorError, Result};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const REAP_POLL: Duration = Duration::from_millis(10);

/// A running monitor child.
#[derive(Debug)]
pub struct MonitorProcess {
    binary: String,
    child: Option<Child>,
    grace: Duration,
}

impl MonitorProcess {
    /// Launches `binary -c <config_path>` with piped stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::BinaryNotFound`] if the binary does not exist and
    /// [`MonitorError::SpawnFailed`] for any other launch failure.
    pub fn start(binary: &str, config_path: &Path, grace: Duration) -> Result<Self> {
        let child = Command::new(binary)
            .arg("-c")
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MonitorError::from_spawn(binary, &e))?;

        tracing::info!(binary, pid = child.id(), config = %config_path.display(), "started monitor");
        Ok(Self { binary: binary.to_string(), child: Some(child), grace })
    }

    /// OS pid of the child, `None` after [`stop`](Self::stop).
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Takes the stdout pipe. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StreamUnavailable`] if it was already taken.
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child
            .as_mut()
            .and_then(|c| c.stdout.take())
            .ok_or(MonitorError::StreamUnavailable("stdout"))
    }

    /// Takes the stderr pipe. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StreamUnavailable`] if it was already taken.
    pub fn take_stderr(&mut self) -> Result<ChildStderr> {
        self.child
            .as_mut()
            .and_then(|c| c.stderr.take())
            .ok_or(MonitorError::StreamUnavailable("stderr"))
    }

    /// Returns true while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        self.child.as_mut().is_some_and(|c| matches!(c.try_wait(), Ok(None)))
    }

    /// Terminates and reaps the child.
    ///
    /// Sends SIGTERM, waits up to the grace period, then kills. Safe to call
    /// repeatedly and after the child has exited on its own.
    ///
    /// Returns the exit status on the call that reaped the child.
    pub fn stop(&mut self) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        let pid = child.id();

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!(binary = %self.binary, pid, %status, "monitor had already exited");
            return Some(status);
        }

        // An unrepresentable grace skips straight to kill.
        if let Some(deadline) = Instant::now().checked_add(self.grace) {
            terminate(&child);
            while Instant::now() < deadline {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::info!(binary = %self.binary, pid, %status, "monitor terminated");
                        return Some(status);
                    }
                    Ok(None) => thread::sleep(REAP_POLL),
                    Err(_) => break,
                }
            }
        }

        if let Err(e) = child.kill() {
            tracing::debug!(pid, error = %e, "kill after grace period failed");
        }
        match child.wait() {
            Ok(status) => {
                tracing::info!(binary = %self.binary, pid, %status, "monitor killed");
                Some(status)
            }
            Err(e) => {
                tracing::warn!(binary = %self.binary, pid, error = %e, "failed to reap monitor");
                None
            }
        }
    }
}

impl Drop for MonitorProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn terminate(child: &Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The child has not
    // been reaped, so the pid still refers to it.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

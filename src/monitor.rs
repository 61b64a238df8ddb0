//! The running `neuron-monitor` pipeline.
//!
//! [`NeuronMonitor`] ties together the materialized tool config, the child
//! process, the stdout reader thread and the latest-line cache. Dropping it
//! (or calling [`shutdown`](NeuronMonitor::shutdown)) kills the child, joins
//! the reader and deletes the config file.

use crate::config::Settings;
use crate::error::Result;
use crate::line_cache::LineCache;
use crate::monitor_config::{MaterializedConfig, MonitorConfig};
use crate::process::MonitorProcess;
use crate::reader::{spawn_reader, spawn_stderr_drain, ReaderExit};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Owns the monitor child and the thread that reads it.
#[derive(Debug)]
pub struct NeuronMonitor {
    config: MaterializedConfig,
    process: MonitorProcess,
    cache: Arc<LineCache>,
    reader: Option<JoinHandle<ReaderExit>>,
    stderr: Option<JoinHandle<()>>,
    join_grace: Duration,
}

impl NeuronMonitor {
    /// Starts `neuron-monitor` and the background reader.
    ///
    /// # Errors
    ///
    /// Fails if the config cannot be written, the binary is missing or does
    /// not launch, or the reader thread cannot be created. Nothing is retried.
    pub fn spawn(settings: &Settings) -> Result<Self> {
        // On any early return below, drop removes the file and reaps the child.
        let config = MonitorConfig::with_period(settings.period()).materialize()?;
        let mut process = MonitorProcess::start(
            &settings.monitor_binary,
            config.path(),
            settings.shutdown_grace(),
        )?;

        let cache = Arc::new(LineCache::new());
        let stdout = process.take_stdout()?;
        let reader = spawn_reader(stdout, Arc::clone(&cache))?;
        let stderr = match process.take_stderr() {
            Ok(stream) => spawn_stderr_drain(stream).ok(),
            Err(_) => None,
        };

        Ok(Self {
            config,
            process,
            cache,
            reader: Some(reader),
            stderr,
            join_grace: settings.shutdown_grace(),
        })
    }

    /// Blocks until the first report line arrives, then returns the latest.
    pub fn read_latest(&self) -> String {
        self.cache.read_latest()
    }

    /// Latest line, waiting at most `timeout` for the first one.
    pub fn read_latest_timeout(&self, timeout: Duration) -> Option<String> {
        self.cache.read_latest_timeout(timeout)
    }

    /// Latest line without waiting.
    #[must_use]
    pub fn try_latest(&self) -> Option<String> {
        self.cache.try_latest()
    }

    /// Report lines received so far.
    #[must_use]
    pub fn lines_received(&self) -> u64 {
        self.cache.published()
    }

    /// Path of the generated tool config. The file is gone after shutdown.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config.path()
    }

    /// Child pid, `None` after shutdown.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Returns true while the child is alive.
    pub fn is_running(&mut self) -> bool {
        self.process.is_running()
    }

    /// Stops the child, joins the reader threads and removes the config.
    ///
    /// Idempotent. The last line stays readable afterwards.
    pub fn shutdown(&mut self) {
        self.process.stop();

        // A grandchild of the monitor can keep the pipes open after the
        // child is reaped; never wait on the reader longer than the grace.
        if let Some(reader) = self.reader.take() {
            if wait_finished(&reader, self.join_grace) {
                match reader.join() {
                    Ok(exit) => tracing::debug!(?exit, "monitor reader finished"),
                    Err(_) => tracing::warn!("monitor reader panicked"),
                }
            } else {
                tracing::warn!("monitor output still open after stop, detaching reader");
            }
        }
        if let Some(stderr) = self.stderr.take() {
            if wait_finished(&stderr, self.join_grace) {
                let _ = stderr.join();
            }
        }
        if let Err(e) = self.config.remove() {
            tracing::warn!(error = %e, "failed to remove monitor config");
        }
    }
}

fn wait_finished<T>(handle: &JoinHandle<T>, grace: Duration) -> bool {
    // `None` when the grace cannot be represented: wait without limit.
    let deadline = Instant::now().checked_add(grace);
    while !handle.is_finished() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

impl Drop for NeuronMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_finished_with_unbounded_grace() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(20)));

        assert!(wait_finished(&handle, Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_finished_gives_up_after_grace() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let _ = rx.recv();
        });

        assert!(!wait_finished(&handle, Duration::from_millis(30)));
        drop(tx);
        handle.join().unwrap();
    }
}

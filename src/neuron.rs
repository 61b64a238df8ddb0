//! AWS Neuron accelerator backend.
//!
//! Glues the monitor pipeline to the reducer and exposes the result as an
//! [`Accelerator`]. Construction starts `neuron-monitor` immediately;
//! [`get_stats`](NeuronAccelerator::get_stats) blocks only until the first
//! report line has arrived.
//!
//! ## Metrics Published
//!
//! - Mean NeuronCore utilization (fraction, last runtime entry)
//! - Device memory used by all runtimes (MiB)

use crate::config::Settings;
use crate::error::Result;
use crate::monitor::NeuronMonitor;
use crate::probe::AcceleratorProbe;
use crate::reducer::{TelemetryReducer, TelemetrySnapshot};
use crate::types::{Accelerator, AcceleratorStats};
use std::time::Duration;

/// Telemetry adapter for Neuron devices.
#[derive(Debug)]
pub struct NeuronAccelerator {
    monitor: NeuronMonitor,
    reducer: TelemetryReducer,
    probe: AcceleratorProbe,
    period: Duration,
}

impl NeuronAccelerator {
    /// Starts the monitor configured by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::BinaryNotFound`](crate::MonitorError::BinaryNotFound)
    /// when the monitor binary is not installed, or another variant if the
    /// monitor cannot be launched. Callers should check
    /// [`has_accelerator`](crate::has_accelerator) first.
    pub fn new(settings: &Settings) -> Result<Self> {
        let monitor = NeuronMonitor::spawn(settings)?;
        tracing::info!(
            binary = %settings.monitor_binary,
            pid = ?monitor.pid(),
            period_secs = settings.period_secs,
            "neuron monitor started"
        );

        Ok(Self {
            monitor,
            reducer: TelemetryReducer::new(),
            probe: AcceleratorProbe::from_settings(settings),
            period: settings.period(),
        })
    }

    /// Returns `(core_utilization, memory_used_mib)` from the latest report.
    ///
    /// Blocks until the monitor has produced its first line. After that it
    /// never blocks, and repeats the last report once the monitor is gone.
    pub fn get_stats(&mut self) -> (f64, f64) {
        let line = self.monitor.read_latest();
        self.reducer.reduce(&line).stats()
    }

    /// Like [`get_stats`](Self::get_stats) but gives up after `timeout`
    /// if no report has arrived yet.
    pub fn get_stats_timeout(&mut self, timeout: Duration) -> Option<(f64, f64)> {
        let line = self.monitor.read_latest_timeout(timeout)?;
        Some(self.reducer.reduce(&line).stats())
    }

    /// Full snapshot from the last reduction, including host figures.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.reducer.snapshot()
    }

    /// Returns whether a Neuron device is present. Memoized per instance.
    pub fn has_accelerator(&self) -> bool {
        self.probe.has_accelerator()
    }

    /// The underlying monitor pipeline.
    #[must_use]
    pub fn monitor(&self) -> &NeuronMonitor {
        &self.monitor
    }

    /// Lines that failed to decode so far.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.reducer.failures()
    }

    /// Stops the monitor and removes its config. Idempotent.
    pub fn shutdown(&mut self) {
        self.monitor.shutdown();
    }
}

impl Accelerator for NeuronAccelerator {
    fn id(&self) -> &'static str {
        "neuron"
    }

    fn is_available(&self) -> bool {
        self.has_accelerator()
    }

    fn stats(&mut self) -> AcceleratorStats {
        self.get_stats().into()
    }

    fn interval_hint(&self) -> Duration {
        self.period
    }

    fn display_name(&self) -> &'static str {
        "AWS Neuron"
    }

    fn stop(&mut self) {
        self.shutdown();
    }
}

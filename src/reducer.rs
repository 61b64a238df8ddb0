//! Reduction of report lines to published telemetry.

use crate::report::MonitorReport;

/// Bytes per mebibyte.
pub const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Telemetry derived from the most recent report.
///
/// `core_utilization` and `memory_used_bytes` are the published pair and are
/// reset on every reduction. The host fields are informational and keep
/// their last value when a report omits them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Mean NeuronCore utilization, nominally 0.0..=1.0.
    pub core_utilization: f64,
    /// Device memory used by all runtimes.
    pub memory_used_bytes: f64,
    /// Host CPU utilization percent (0-100).
    pub host_cpu_utilization: f64,
    /// Host memory in use, if ever reported.
    pub host_memory_used_bytes: Option<f64>,
    /// Host memory installed, if ever reported.
    pub host_memory_total_bytes: Option<f64>,
}

impl TelemetrySnapshot {
    /// Device memory used, in MiB.
    #[must_use]
    pub fn memory_used_mib(&self) -> f64 {
        self.memory_used_bytes / BYTES_PER_MIB
    }

    /// The published `(core_utilization, memory_used_mib)` pair.
    #[must_use]
    pub fn stats(&self) -> (f64, f64) {
        (self.core_utilization, self.memory_used_mib())
    }
}

/// Owns the current [`TelemetrySnapshot`] and folds report lines into it.
#[derive(Debug, Default)]
pub struct TelemetryReducer {
    snapshot: TelemetrySnapshot,
    reductions: u64,
    failures: u64,
}

impl TelemetryReducer {
    /// Creates a reducer with an all-zero snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one raw line into the snapshot and returns the result.
    ///
    /// The published pair is zeroed first, so a line without runtime data,
    /// or one that fails to decode, yields `(0.0, 0.0)`. Decode failures are
    /// logged and counted, never returned.
    pub fn reduce(&mut self, line: &str) -> TelemetrySnapshot {
        self.reductions += 1;
        self.snapshot.core_utilization = 0.0;
        self.snapshot.memory_used_bytes = 0.0;

        match MonitorReport::parse(line) {
            Ok(report) => self.apply(&report),
            Err(e) => {
                self.failures += 1;
                tracing::warn!(error = %e, failures = self.failures, "skipping monitor report");
            }
        }

        self.snapshot
    }

    fn apply(&mut self, report: &MonitorReport) {
        if let Some(cpu) = report.host_cpu_utilization() {
            self.snapshot.host_cpu_utilization = cpu;
        }
        if let Some((used, total)) = report.host_memory() {
            if used.is_some() {
                self.snapshot.host_memory_used_bytes = used;
            }
            if total.is_some() {
                self.snapshot.host_memory_total_bytes = total;
            }
        }

        if let Some(fraction) = report.core_utilization() {
            self.snapshot.core_utilization = fraction;
        }
        self.snapshot.memory_used_bytes = report.memory_used_bytes();

        tracing::trace!(
            runtimes = report.runtimes().len(),
            core_utilization = self.snapshot.core_utilization,
            memory_used_bytes = self.snapshot.memory_used_bytes,
            "reduced monitor report"
        );
    }

    /// Snapshot from the last reduction.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot
    }

    /// Lines reduced so far.
    #[must_use]
    pub fn reductions(&self) -> u64 {
        self.reductions
    }

    /// Lines that failed to decode.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

//! Generated configuration for the `neuron-monitor` process.
//!
//! The monitor reads its sampling period and metric groups from a JSON file
//! passed with `-c`. [`MonitorConfig`] models that document and
//! [`MaterializedConfig`] owns the temp file it is written to; dropping the
//! latter deletes the file.

use crate::error::{MonitorError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Host-level metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMetricKind {
    /// Per-vCPU usage percentages.
    VcpuUsage,
    /// Host memory totals.
    MemoryInfo,
}

/// Per-runtime metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMetricKind {
    /// Per-NeuronCore utilization counters.
    NeuroncoreCounters,
    /// Device and host memory used by the runtime.
    MemoryUsed,
    /// vCPU usage of the runtime process.
    NeuronRuntimeVcpuUsage,
}

/// Immutable description of what the monitor should sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    period: Duration,
    system_metrics: Vec<SystemMetricKind>,
    runtime_metrics: Vec<RuntimeMetricKind>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::with_period(Duration::from_secs(1))
    }
}

impl MonitorConfig {
    /// The fixed metric set, sampled every `period`.
    ///
    /// The tool only accepts whole seconds, so the period is truncated to
    /// whole seconds with a floor of 1s.
    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        let period = Duration::from_secs(period.as_secs().max(1));
        Self {
            period,
            system_metrics: vec![SystemMetricKind::VcpuUsage, SystemMetricKind::MemoryInfo],
            runtime_metrics: vec![
                RuntimeMetricKind::NeuroncoreCounters,
                RuntimeMetricKind::MemoryUsed,
                RuntimeMetricKind::NeuronRuntimeVcpuUsage,
            ],
        }
    }

    /// Sampling period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Requested host metric groups, in order.
    #[must_use]
    pub fn system_metrics(&self) -> &[SystemMetricKind] {
        &self.system_metrics
    }

    /// Requested runtime metric groups, in order.
    #[must_use]
    pub fn runtime_metrics(&self) -> &[RuntimeMetricKind] {
        &self.runtime_metrics
    }

    /// Renders the document the tool expects.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ConfigEncode`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.document()).map_err(MonitorError::ConfigEncode)
    }

    /// Writes the document to a fresh temp file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn materialize(&self) -> Result<MaterializedConfig> {
        let json = self.to_json()?;
        let mut file = tempfile::Builder::new()
            .prefix("neuron-monitor-")
            .suffix(".json")
            .tempfile()
            .map_err(MonitorError::ConfigMaterialize)?;
        file.write_all(json.as_bytes()).map_err(MonitorError::ConfigMaterialize)?;
        file.flush().map_err(MonitorError::ConfigMaterialize)?;

        let path = file.path().to_path_buf();
        tracing::debug!(path = %path.display(), "materialized monitor config");
        Ok(MaterializedConfig { path, file: Some(file) })
    }

    fn document(&self) -> ConfigDocument {
        ConfigDocument {
            period: format!("{}s", self.period.as_secs()),
            system_metrics: self.system_metrics.iter().map(|&kind| TypeEntry { kind }).collect(),
            neuron_runtimes: vec![RuntimeEntry {
                tag_filter: ".*",
                metrics: self.runtime_metrics.iter().map(|&kind| TypeEntry { kind }).collect(),
            }],
        }
    }
}

#[derive(Serialize)]
struct ConfigDocument {
    period: String,
    system_metrics: Vec<TypeEntry<SystemMetricKind>>,
    neuron_runtimes: Vec<RuntimeEntry>,
}

#[derive(Serialize)]
struct TypeEntry<K> {
    #[serde(rename = "type")]
    kind: K,
}

#[derive(Serialize)]
struct RuntimeEntry {
    tag_filter: &'static str,
    metrics: Vec<TypeEntry<RuntimeMetricKind>>,
}

/// On-disk copy of a [`MonitorConfig`], removed by [`remove`](Self::remove) or on drop.
#[derive(Debug)]
pub struct MaterializedConfig {
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl MaterializedConfig {
    /// Path handed to the monitor.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once [`remove`](Self::remove) has run.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.file.is_none()
    }

    /// Deletes the file. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be deleted.
    pub fn remove(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                file.close().or_else(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Ok(()),
                    _ => Err(MonitorError::Io(e)),
                })?;
                tracing::debug!(path = %self.path.display(), "removed monitor config");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

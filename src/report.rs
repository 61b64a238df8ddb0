//! Typed view of one `neuron-monitor` JSON report line.
//!
//! Only the sections the reducer reads are modelled; everything else in the
//! document is ignored. Every section is optional so partial reports decode.
//! A runtime section of the wrong shape (say, a string where a number
//! belongs) fails the whole line; a malformed `system_data` section is
//! dropped on its own since it only feeds informational host figures.

use crate::error::Result;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorReport {
    /// Host-level metrics, `None` when absent or malformed.
    #[serde(default, deserialize_with = "lenient")]
    pub system_data: Option<SystemData>,
    /// One entry per Neuron runtime, in the order the tool lists them.
    #[serde(default)]
    pub neuron_runtime_data: Option<Vec<RuntimeData>>,
}

/// `system_data` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemData {
    /// `vcpu_usage` metric group.
    #[serde(default)]
    pub vcpu_usage: Option<VcpuUsage>,
    /// `memory_info` metric group.
    #[serde(default)]
    pub memory_info: Option<MemoryInfo>,
}

/// Host vCPU usage, keyed by vCPU id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VcpuUsage {
    /// Per-vCPU percentages.
    #[serde(default)]
    pub usage_data: Option<BTreeMap<String, VcpuCoreUsage>>,
}

/// Percentages for one vCPU.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct VcpuCoreUsage {
    /// Idle percentage, 0 when absent.
    #[serde(default)]
    pub idle: f64,
}

/// Host memory figures.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MemoryInfo {
    /// Physical memory installed.
    #[serde(default)]
    pub memory_total_bytes: Option<f64>,
    /// Physical memory in use.
    #[serde(default)]
    pub memory_used_bytes: Option<f64>,
}

/// One `neuron_runtime_data` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeData {
    /// Metric groups reported for this runtime.
    #[serde(default)]
    pub report: Option<RuntimeReport>,
}

/// Metric groups of one runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeReport {
    /// `neuroncore_counters` group.
    #[serde(default)]
    pub neuroncore_counters: Option<NeuroncoreCounters>,
    /// `memory_used` group.
    #[serde(default)]
    pub memory_used: Option<MemoryUsed>,
}

/// NeuronCore counters, keyed by core id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NeuroncoreCounters {
    /// Cores in use by this runtime.
    #[serde(default)]
    pub neuroncores_in_use: Option<BTreeMap<String, CoreCounters>>,
}

/// Counters for one NeuronCore.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CoreCounters {
    /// Utilization percentage, 0 when absent.
    #[serde(default)]
    pub neuroncore_utilization: f64,
}

/// `memory_used` group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryUsed {
    /// Bytes used by the runtime.
    #[serde(default)]
    pub neuron_runtime_used_bytes: Option<RuntimeUsedBytes>,
}

/// Runtime memory with its breakdown.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeUsedBytes {
    /// Where the bytes went.
    #[serde(default)]
    pub usage_breakdown: Option<UsageBreakdown>,
}

/// Memory breakdown.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageBreakdown {
    /// Core id -> category -> bytes.
    #[serde(default)]
    pub neuroncore_memory_usage: Option<BTreeMap<String, BTreeMap<String, f64>>>,
}

/// Decodes an optional section, yielding `None` instead of an error when
/// its shape is unexpected.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(section) => Ok(Some(section)),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed host section");
            Ok(None)
        }
    }
}

/// Sum and count of per-core utilization percentages for one runtime entry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoreAggregate {
    /// Sum of utilization percentages.
    pub total_utilization: f64,
    /// Number of cores seen.
    pub cores: usize,
}

impl CoreAggregate {
    /// Mean utilization as a fraction, `None` without cores.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        (self.cores > 0).then(|| self.total_utilization / self.cores as f64 / 100.0)
    }
}

impl MonitorReport {
    /// Decodes one output line.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ReportDecode`](crate::error::MonitorError::ReportDecode)
    /// for malformed JSON or a section of unexpected shape.
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Host CPU utilization percent: 100 minus the mean vCPU idle percentage.
    ///
    /// `None` when the vCPU section is absent or lists no vCPUs.
    #[must_use]
    pub fn host_cpu_utilization(&self) -> Option<f64> {
        let usage = self.system_data.as_ref()?.vcpu_usage.as_ref()?.usage_data.as_ref()?;
        if usage.is_empty() {
            return None;
        }
        let total_idle: f64 = usage.values().map(|core| core.idle).sum();
        Some(100.0 - total_idle / usage.len() as f64)
    }

    /// Host memory as `(used, total)` bytes, when reported.
    #[must_use]
    pub fn host_memory(&self) -> Option<(Option<f64>, Option<f64>)> {
        let info = self.system_data.as_ref()?.memory_info.as_ref()?;
        Some((info.memory_used_bytes, info.memory_total_bytes))
    }

    /// Runtime entries, empty when the section is absent.
    #[must_use]
    pub fn runtimes(&self) -> &[RuntimeData] {
        self.neuron_runtime_data.as_deref().unwrap_or_default()
    }

    /// NeuronCore utilization fraction of the last runtime entry.
    ///
    /// Earlier entries do not contribute: each entry replaces the running
    /// aggregate. `None` when there are no entries or the last one reports
    /// no cores.
    #[must_use]
    pub fn core_utilization(&self) -> Option<f64> {
        self.runtimes()
            .iter()
            .map(RuntimeData::core_aggregate)
            .last()
            .and_then(|aggregate| aggregate.fraction())
    }

    /// Device memory in bytes, summed over every category, core and runtime entry.
    #[must_use]
    pub fn memory_used_bytes(&self) -> f64 {
        self.runtimes().iter().map(RuntimeData::memory_used_bytes).sum()
    }
}

impl RuntimeData {
    /// Utilization sum and core count of this entry.
    #[must_use]
    pub fn core_aggregate(&self) -> CoreAggregate {
        let cores = self
            .report
            .as_ref()
            .and_then(|r| r.neuroncore_counters.as_ref())
            .and_then(|c| c.neuroncores_in_use.as_ref());

        cores.map_or_else(CoreAggregate::default, |cores| CoreAggregate {
            total_utilization: cores.values().map(|c| c.neuroncore_utilization).sum(),
            cores: cores.len(),
        })
    }

    /// Device memory used by this entry across all of its cores.
    #[must_use]
    pub fn memory_used_bytes(&self) -> f64 {
        self.report
            .as_ref()
            .and_then(|r| r.memory_used.as_ref())
            .and_then(|m| m.neuron_runtime_used_bytes.as_ref())
            .and_then(|b| b.usage_breakdown.as_ref())
            .and_then(|b| b.neuroncore_memory_usage.as_ref())
            .map_or(0.0, |cores| cores.values().flat_map(|c| c.values()).sum())
    }
}

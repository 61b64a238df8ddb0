//! Adapter settings.
//!
//! Supports YAML configuration with precedence: CLI > ENV > file > defaults.
//! The CLI layer lives in the `neuron-stats` binary; this module owns the
//! file, environment and default layers.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`Settings::monitor_binary`].
pub const ENV_MONITOR_BIN: &str = "NEURON_MONITOR_BIN";
/// Environment variable overriding [`Settings::probe_binary`].
pub const ENV_PROBE_BIN: &str = "NEURON_LS_BIN";
/// Environment variable overriding [`Settings::period_secs`].
pub const ENV_PERIOD_SECS: &str = "NEURON_TELEMETRY_PERIOD_SECS";
/// Environment variable overriding [`Settings::log_level`].
pub const ENV_LOG_LEVEL: &str = "NEURON_TELEMETRY_LOG";

/// Upper bound for [`Settings::shutdown_grace_ms`].
pub const MAX_SHUTDOWN_GRACE_MS: u64 = 60_000;
/// Upper bound for [`Settings::probe_timeout_ms`].
pub const MAX_PROBE_TIMEOUT_MS: u64 = 300_000;

/// Runtime settings for the telemetry adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Streaming monitor executable.
    #[serde(default = "default_monitor_binary")]
    pub monitor_binary: String,

    /// One-shot device listing executable.
    #[serde(default = "default_probe_binary")]
    pub probe_binary: String,

    /// Polling period handed to the monitor, in whole seconds.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Upper bound on the device listing run.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL on teardown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_monitor_binary() -> String {
    "neuron-monitor".to_string()
}
fn default_probe_binary() -> String {
    "neuron-ls".to_string()
}
fn default_period_secs() -> u64 {
    1
}
fn default_probe_timeout_ms() -> u64 {
    5000
}
fn default_shutdown_grace_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitor_binary: default_monitor_binary(),
            probe_binary: default_probe_binary(),
            period_secs: default_period_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings file location, `<config dir>/neuron-telemetry/config.yaml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("neuron-telemetry").join("config.yaml"))
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| MonitorError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails.
    pub fn parse(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map(|l| l.line()).unwrap_or(0);
            MonitorError::ConfigParse { line, message: e.to_string() }
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings with fallback to defaults when the file is missing.
    ///
    /// A file that exists but fails to parse is still an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path) {
            Err(MonitorError::ConfigNotFound(path)) => {
                tracing::debug!(%path, "no settings file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(bin) = lookup(ENV_MONITOR_BIN) {
            self.monitor_binary = bin;
        }
        if let Some(bin) = lookup(ENV_PROBE_BIN) {
            self.probe_binary = bin;
        }
        if let Some(raw) = lookup(ENV_PERIOD_SECS) {
            self.period_secs = raw.trim().parse().map_err(|_| MonitorError::ConfigInvalid {
                key: ENV_PERIOD_SECS.to_string(),
                message: format!("'{raw}' is not a whole number of seconds"),
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ConfigInvalid`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.period_secs == 0 {
            return Err(MonitorError::ConfigInvalid {
                key: "period_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.monitor_binary.trim().is_empty() {
            return Err(MonitorError::ConfigInvalid {
                key: "monitor_binary".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.probe_binary.trim().is_empty() {
            return Err(MonitorError::ConfigInvalid {
                key: "probe_binary".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.shutdown_grace_ms > MAX_SHUTDOWN_GRACE_MS {
            return Err(MonitorError::ConfigInvalid {
                key: "shutdown_grace_ms".to_string(),
                message: format!("must be at most {MAX_SHUTDOWN_GRACE_MS}"),
            });
        }
        if self.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(MonitorError::ConfigInvalid {
                key: "probe_timeout_ms".to_string(),
                message: format!("must be at most {MAX_PROBE_TIMEOUT_MS}"),
            });
        }
        Ok(())
    }

    /// Polling period as a Duration.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Probe timeout as a Duration.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Shutdown grace period as a Duration.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

//! # Neuron-Telemetry
//!
//! Utilization and memory telemetry for AWS Neuron accelerators, for
//! profilers that sample device statistics alongside CPU and host memory.
//!
//! The adapter launches the vendor `neuron-monitor` tool with a generated
//! config, keeps only the most recent JSON report it prints, and reduces
//! that report on demand to a `(core_utilization, memory_used_mib)` pair.
//! Presence detection runs `neuron-ls` once per process.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neuron_telemetry::prelude::*;
//!
//! if has_accelerator() {
//!     let mut neuron = NeuronAccelerator::new(&Settings::default())?;
//!     let (util, mib) = neuron.get_stats();
//!     println!("{:.1}% {mib:.1} MiB", util * 100.0);
//! }
//! ```
//!
//! ## Threads and Processes
//!
//! Each [`NeuronAccelerator`] owns one `neuron-monitor` child and one reader
//! thread. Dropping it terminates the child, joins the reader and deletes the
//! generated config file.

#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Configuration
// ============================================================================

/// Adapter settings (YAML file, environment, defaults).
pub mod config;

/// Document handed to `neuron-monitor` via `-c`.
pub mod monitor_config;

// ============================================================================
// Process Plumbing
// ============================================================================

/// Bounded-time subprocess execution.
pub mod subprocess;

/// `neuron-ls` device presence probe.
pub mod probe;

/// Ownership of the `neuron-monitor` child.
pub mod process;

/// Background line reader for the monitor's output.
pub mod reader;

/// Single-slot cache of the newest report line.
pub mod line_cache;

/// The running monitor pipeline.
pub mod monitor;

// ============================================================================
// Reports and Reduction
// ============================================================================

/// Typed view of one monitor report.
pub mod report;

/// Reduction of reports to published figures.
pub mod reducer;

// ============================================================================
// Backends
// ============================================================================

/// Accelerator trait and stats type.
pub mod types;

/// Neuron backend.
pub mod neuron;

/// Log subscriber setup.
pub mod logging;

// ============================================================================
// Error Types
// ============================================================================

/// Error types for adapter operations.
pub mod error;

pub use config::Settings;
pub use error::{MonitorError, Result};
pub use neuron::NeuronAccelerator;
pub use probe::{has_accelerator, AcceleratorProbe};
pub use reducer::TelemetrySnapshot;
pub use types::{Accelerator, AcceleratorStats, BoxedAccelerator};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust,ignore
/// use neuron_telemetry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{MonitorError, Result};
    pub use crate::neuron::NeuronAccelerator;
    pub use crate::probe::{has_accelerator, AcceleratorProbe};
    pub use crate::reducer::{TelemetryReducer, TelemetrySnapshot};
    pub use crate::types::{Accelerator, AcceleratorStats, BoxedAccelerator};
}

//! Core types shared with the profiler that consumes this crate.
//!
//! - [`AcceleratorStats`]: the published utilization/memory pair
//! - [`Accelerator`]: trait a profiler drives, one implementation per device family

use std::time::Duration;

/// Point-in-time accelerator figures handed to the profiler.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcceleratorStats {
    /// Mean core utilization, nominally 0.0..=1.0.
    pub utilization: f64,
    /// Device memory in use, in MiB.
    pub memory_used_mib: f64,
}

impl From<(f64, f64)> for AcceleratorStats {
    fn from((utilization, memory_used_mib): (f64, f64)) -> Self {
        Self { utilization, memory_used_mib }
    }
}

impl From<AcceleratorStats> for (f64, f64) {
    fn from(stats: AcceleratorStats) -> Self {
        (stats.utilization, stats.memory_used_mib)
    }
}

/// Trait for accelerator backends.
///
/// Backends must be `Send` so a profiler can sample from its own thread.
/// None of the methods fail: a backend that cannot produce data reports zeros.
///
/// # Example
///
/// ```rust,ignore
/// use neuron_telemetry::{Accelerator, AcceleratorStats};
///
/// struct Idle;
///
/// impl Accelerator for Idle {
///     fn id(&self) -> &'static str {
///         "idle"
///     }
///
///     fn is_available(&self) -> bool {
///         false
///     }
///
///     fn stats(&mut self) -> AcceleratorStats {
///         AcceleratorStats::default()
///     }
/// }
/// ```
pub trait Accelerator: Send {
    /// Returns the unique identifier for this backend.
    fn id(&self) -> &'static str;

    /// Returns true if a device of this family is present.
    fn is_available(&self) -> bool;

    /// Samples the current figures.
    fn stats(&mut self) -> AcceleratorStats;

    /// Suggested sampling interval.
    fn interval_hint(&self) -> Duration {
        Duration::from_millis(1000)
    }

    /// Returns a human-readable name for this backend.
    fn display_name(&self) -> &'static str {
        self.id()
    }

    /// Called when the profiler starts sampling.
    fn start(&mut self) {}

    /// Called when the profiler stops sampling.
    fn stop(&mut self) {}

    /// Called after the profiler forks or otherwise needs a fresh device handle.
    fn reinit(&mut self) {}
}

/// A boxed backend for dynamic dispatch.
pub type BoxedAccelerator = Box<dyn Accelerator>;

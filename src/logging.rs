//! Log subscriber setup for binaries embedding the adapter.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host process. [`init`] is the default the bundled CLI uses.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set, otherwise `level`.
///
/// `debug` forces the `debug` level for this crate on top of either.
#[must_use]
pub fn filter(level: &str, debug: bool) -> EnvFilter {
    let default = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    if debug {
        match "neuron_telemetry=debug".parse::<Directive>() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    }
}

/// Installs a stderr `fmt` subscriber.
///
/// Returns false if a global subscriber was already set, which is not an error.
pub fn init(level: &str, debug: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level, debug))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let filter = filter("chatty", false);
        assert!(filter.max_level_hint().is_some());
    }

    #[test]
    fn test_debug_flag_adds_crate_directive() {
        let filter = filter("warn", true);
        assert!(filter.to_string().contains("neuron_telemetry=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init("info", false);
        assert!(!init("info", false));
    }
}

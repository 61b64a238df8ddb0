//! Neuron device presence detection.
//!
//! Runs `neuron-ls` once and caches the answer for the lifetime of the
//! probe. Every failure mode (binary missing, non-zero exit, timeout) is
//! reported as "no accelerator".

use crate::config::Settings;
use crate::subprocess::{run_with_timeout, SubprocessResult};
use std::sync::OnceLock;
use std::time::Duration;

/// Phrase `neuron-ls` prints when the driver sees no devices.
pub const NO_DEVICES_PHRASE: &str = "No neuron devices found";

/// Memoized answer to "is there a Neuron device on this host?".
#[derive(Debug)]
pub struct AcceleratorProbe {
    binary: String,
    timeout: Duration,
    present: OnceLock<bool>,
}

impl AcceleratorProbe {
    /// Creates a probe that runs `binary` with the given timeout.
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout, present: OnceLock::new() }
    }

    /// Creates a probe from adapter settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.probe_binary.clone(), settings.probe_timeout())
    }

    /// Returns whether a device is present, running the listing at most once.
    pub fn has_accelerator(&self) -> bool {
        *self.present.get_or_init(|| {
            let present = self.run();
            tracing::info!(binary = %self.binary, present, "neuron device probe finished");
            present
        })
    }

    /// Returns the cached answer without running the listing.
    #[must_use]
    pub fn cached(&self) -> Option<bool> {
        self.present.get().copied()
    }

    fn run(&self) -> bool {
        match run_with_timeout(&self.binary, &[], self.timeout) {
            SubprocessResult::Success(output) => {
                !String::from_utf8_lossy(&output.stdout).contains(NO_DEVICES_PHRASE)
            }
            SubprocessResult::Failed(output) => {
                tracing::debug!(binary = %self.binary, status = %output.status, "device listing failed");
                false
            }
            SubprocessResult::NotFound => {
                tracing::debug!(binary = %self.binary, "device listing binary not found");
                false
            }
            SubprocessResult::Timeout => {
                tracing::debug!(binary = %self.binary, timeout = ?self.timeout, "device listing timed out");
                false
            }
            SubprocessResult::SpawnError => {
                tracing::debug!(binary = %self.binary, "device listing could not be spawned");
                false
            }
        }
    }
}

impl Default for AcceleratorProbe {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Process-wide probe using default settings.
///
/// Runs `neuron-ls` on first call only.
pub fn has_accelerator() -> bool {
    static DEFAULT_PROBE: OnceLock<AcceleratorProbe> = OnceLock::new();
    DEFAULT_PROBE.get_or_init(AcceleratorProbe::default).has_accelerator()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn probe_for(path: &Path) -> AcceleratorProbe {
        AcceleratorProbe::new(path.to_str().unwrap(), Duration::from_secs(2))
    }

    #[test]
    fn test_device_listing_reports_present() {
        let dir = tempfile::tempdir().unwrap();
        let ls = script(dir.path(), "neuron-ls", "echo 'NEURON DEVICE 0  2 cores'");

        assert!(probe_for(&ls).has_accelerator());
    }

    #[test]
    fn test_no_devices_phrase_reports_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ls = script(dir.path(), "neuron-ls", "echo 'No neuron devices found.'");

        assert!(!probe_for(&ls).has_accelerator());
    }

    #[test]
    fn test_missing_binary_reports_absent() {
        let probe = AcceleratorProbe::new("neuron-ls-does-not-exist-12345", Duration::from_secs(1));
        assert!(!probe.has_accelerator());
    }

    #[test]
    fn test_nonzero_exit_reports_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ls = script(dir.path(), "neuron-ls", "echo 'NEURON DEVICE 0'; exit 1");

        assert!(!probe_for(&ls).has_accelerator());
    }

    #[test]
    fn test_timeout_reports_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ls = script(dir.path(), "neuron-ls", "sleep 10");
        let probe = AcceleratorProbe::new(ls.to_str().unwrap(), Duration::from_millis(100));

        assert!(!probe.has_accelerator());
    }

    #[test]
    fn test_result_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("runs");
        let ls = script(
            dir.path(),
            "neuron-ls",
            &format!("echo run >> {}\necho 'NEURON DEVICE 0'", counter.display()),
        );
        let probe = probe_for(&ls);

        assert_eq!(probe.cached(), None);
        assert!(probe.has_accelerator());
        assert!(probe.has_accelerator());
        assert_eq!(probe.cached(), Some(true));

        // Answer survives the binary changing underneath it.
        fs::write(&ls, "#!/bin/sh\necho 'No neuron devices found'\n").unwrap();
        assert!(probe.has_accelerator());

        let runs = fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 1);
    }
}

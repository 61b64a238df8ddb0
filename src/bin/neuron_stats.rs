//! neuron-stats: print Neuron utilization and memory samples.
//!
//! Run: `neuron-stats --count 10`

#![cfg_attr(test, allow(clippy::unwrap_used))]

use neuron_telemetry::{logging, AcceleratorProbe, NeuronAccelerator, Settings};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static STOP: AtomicBool = AtomicBool::new(false);

/// Shortest wait for the first report, so `--interval-ms 0` does not spin.
const MIN_REPORT_WAIT: Duration = Duration::from_millis(10);

/// neuron-stats: sample AWS Neuron accelerator telemetry
#[derive(Parser, Debug)]
#[command(name = "neuron-stats")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Print (utilization, memory MiB) samples from neuron-monitor", long_about = None)]
struct Cli {
    /// Settings file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// neuron-monitor executable
    #[arg(long)]
    monitor_bin: Option<String>,

    /// neuron-ls executable
    #[arg(long)]
    probe_bin: Option<String>,

    /// Monitor polling period in seconds
    #[arg(short, long)]
    period: Option<u64>,

    /// Sample interval in milliseconds
    #[arg(short, long, default_value = "100")]
    interval_ms: u64,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Print whether a device is present and exit
    #[arg(long)]
    probe: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => match Settings::default_path() {
                Some(path) => Settings::load_or_default(path)?,
                None => Settings::default(),
            },
        }
        .with_env()?;

        if let Some(bin) = &self.monitor_bin {
            settings.monitor_binary.clone_from(bin);
        }
        if let Some(bin) = &self.probe_bin {
            settings.probe_binary.clone_from(bin);
        }
        if let Some(period) = self.period {
            settings.period_secs = period;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    logging::init(&settings.log_level, cli.debug);

    if cli.probe {
        let present = AcceleratorProbe::from_settings(&settings).has_accelerator();
        println!("{present}");
        return Ok(());
    }

    install_sigint_handler();

    let mut neuron = NeuronAccelerator::new(&settings)
        .with_context(|| format!("starting {}", settings.monitor_binary))?;
    let interval = Duration::from_millis(cli.interval_ms);
    let first_wait = report_wait(interval);

    let mut samples = 0u64;
    while !STOP.load(Ordering::Relaxed) && cli.count.map_or(true, |n| samples < n) {
        // Bounded wait so Ctrl-C is honoured before the first report.
        let Some((util, mib)) = neuron.get_stats_timeout(first_wait) else {
            continue;
        };
        println!("({util}, {mib})");
        samples += 1;
        std::thread::sleep(interval);
    }

    neuron.shutdown();
    tracing::info!(samples, failures = neuron.decode_failures(), "neuron-stats finished");
    Ok(())
}

fn report_wait(interval: Duration) -> Duration {
    interval.max(MIN_REPORT_WAIT)
}

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn install_sigint_handler() {
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

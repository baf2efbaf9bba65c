/// Scanner module: orchestrates snapshots and two-snapshot growth scans.
///
/// - [`parallel`] builds one [`Snapshot`] with a producer / worker-pool /
///   aggregator pipeline.
/// - [`Scanner::scan`] takes two snapshots `interval` apart and diffs them.
/// - [`start_scan`] runs the same scan on a background thread and streams
///   [`ScanProgress`] messages, for live displays.
pub mod filters;
pub mod parallel;
pub mod progress;
pub mod store;

pub use filters::ExcludeFilter;
pub use parallel::{take_snapshot, WalkOptions};
pub use progress::ScanProgress;
pub use store::SnapshotStore;

use crate::analysis;
use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::model::{ScanResult, Snapshot};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Everything the snapshot engine and growth analyser need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Roots to scan.
    pub paths: Vec<PathBuf>,
    /// Wait between the two snapshots of a scan.
    pub interval: Duration,
    /// Minimum growth, in bytes, for a file to be reported.
    pub threshold_bytes: u64,
    /// Number of stat workers. `0` means one per CPU.
    pub worker_count: usize,
    /// Maximum directory depth below each root. `0` means unlimited.
    pub max_depth: usize,
    pub follow_symlinks: bool,
    /// Base-name globs to skip, e.g. `*.gz`.
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("/var/log"), PathBuf::from("/tmp")],
            interval: Duration::from_secs(5),
            threshold_bytes: 10 * 1024 * 1024,
            worker_count: 4,
            max_depth: 10,
            follow_symlinks: false,
            exclude_patterns: ["*.gz", "*.zip", "*.bz2", "*.xz"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScanConfig {
    /// Check the configuration and fill in derived defaults.
    pub fn validate(mut self) -> Result<Self, ScanError> {
        if self.paths.is_empty() {
            return Err(ScanError::InvalidConfig("no scan paths configured".into()));
        }
        if self.worker_count == 0 {
            self.worker_count = num_cpus::get().max(1);
        }
        Ok(self)
    }

    /// Threshold expressed in MiB, as users usually give it.
    pub fn with_threshold_mb(mut self, mb: f64) -> Self {
        self.threshold_bytes = (mb.max(0.0) * 1024.0 * 1024.0) as u64;
        self
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            max_depth: self.max_depth,
            follow_symlinks: self.follow_symlinks,
            workers: self.worker_count,
        }
    }
}

/// Runs snapshots and growth scans for one configuration.
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
    filter: ExcludeFilter,
}

impl Scanner {
    /// Validate `config` and compile its exclude patterns.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let config = config.validate()?;
        let filter = ExcludeFilter::new(&config.exclude_patterns)?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Take a single snapshot of the configured roots.
    pub fn take_snapshot(&self, cancel: &CancelToken) -> Result<Snapshot, ScanError> {
        parallel::take_snapshot(
            &self.config.paths,
            &self.filter,
            &self.config.walk_options(),
            cancel,
        )
    }

    /// Take two snapshots `interval` apart and report files that grew by at
    /// least the configured threshold.
    pub fn scan(&self, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        self.scan_with_progress(cancel, |_| {})
    }

    /// [`scan`](Self::scan), reporting each phase to `on_progress`.
    ///
    /// Terminal messages (`Complete`, `Cancelled`, `Failed`) are left to the
    /// caller, which owns the returned `Result`.
    pub fn scan_with_progress(
        &self,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(ScanProgress),
    ) -> Result<ScanResult, ScanError> {
        let start_time = Utc::now();

        let started = Instant::now();
        let snapshot1 = self.take_snapshot(cancel)?;
        on_progress(ScanProgress::SnapshotTaken {
            index: 1,
            file_count: snapshot1.file_count(),
            total_size: snapshot1.total_size(),
            duration: started.elapsed(),
        });

        on_progress(ScanProgress::Waiting {
            interval: self.config.interval,
        });
        if !cancel.sleep(self.config.interval) {
            return Err(ScanError::Cancelled);
        }

        let started = Instant::now();
        let snapshot2 = self.take_snapshot(cancel)?;
        on_progress(ScanProgress::SnapshotTaken {
            index: 2,
            file_count: snapshot2.file_count(),
            total_size: snapshot2.total_size(),
            duration: started.elapsed(),
        });

        let growing_files = analysis::diff(&snapshot1, &snapshot2, self.config.threshold_bytes);
        let total_growth = analysis::total_growth(&growing_files);

        info!(
            "Scan complete: {} growing files, {} bytes total growth across {} files",
            growing_files.len(),
            total_growth,
            snapshot2.file_count()
        );

        Ok(ScanResult {
            start_time,
            end_time: Utc::now(),
            interval: self.config.interval,
            snapshot1,
            snapshot2,
            growing_files,
            total_growth,
            paths: self.config.paths.clone(),
        })
    }
}

/// Maximum number of progress messages that may queue up in the channel.
///
/// A scan emits at most five messages, so this never applies back-pressure
/// in practice; it only bounds memory if the consumer disappears.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Handle to a running or completed background scan.
///
/// Dropping the handle cancels the scan.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    cancel: CancelToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Block until the scan thread has exited.
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Scan thread panicked");
            }
        }
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Start a scan on a background thread.
///
/// Returns immediately. Progress, including the final result, arrives on
/// `handle.progress_rx`; exactly one terminal message is sent unless the
/// receiver has been dropped.
pub fn start_scan(config: ScanConfig) -> Result<ScanHandle, ScanError> {
    let scanner = Scanner::new(config)?;
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel = CancelToken::new();
    let cancel_clone = cancel.clone();

    let thread = thread::Builder::new()
        .name("logmonster-scanner".into())
        .spawn(move || run_background_scan(scanner, progress_tx, cancel_clone))
        .map_err(ScanError::Spawn)?;

    Ok(ScanHandle {
        progress_rx,
        cancel,
        thread: Some(thread),
    })
}

fn run_background_scan(scanner: Scanner, progress_tx: Sender<ScanProgress>, cancel: CancelToken) {
    info!(
        "Starting scan of {} path(s), interval {:?}",
        scanner.config().paths.len(),
        scanner.config().interval
    );

    let result = scanner.scan_with_progress(&cancel, |msg| {
        let _ = progress_tx.send(msg);
    });

    let terminal = match result {
        Ok(result) => ScanProgress::Complete(Box::new(result)),
        Err(ScanError::Cancelled) => {
            info!("Scan cancelled");
            ScanProgress::Cancelled
        }
        Err(err) => {
            warn!("Scan failed: {err}");
            ScanProgress::Failed(err.to_string())
        }
    };
    let _ = progress_tx.send(terminal);
}

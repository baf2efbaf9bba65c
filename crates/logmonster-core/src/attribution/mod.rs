/// Attribution: maps a file to the live processes holding it open.
///
/// Resolution runs through an ordered list of [`OpenFileLocator`] tiers:
/// `lsof` first, then a scan of every process's descriptor table. Each PID
/// a tier surfaces is expanded into a [`ProcessInfo`] through a
/// [`ProcessLookup`]; PIDs that vanish in between are dropped.
pub mod lsof;
pub mod proc_fd;
pub mod process_info;

pub use lsof::LsofLocator;
pub use proc_fd::ProcFdLocator;
pub use process_info::SystemProcessLookup;

use crate::error::AttributionError;
use crate::model::ProcessInfo;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One strategy for listing the PIDs that hold a file open.
pub trait OpenFileLocator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// PIDs with `path` open. `path` is already absolute.
    ///
    /// An `Err` means the tier could not run at all; the attributor moves
    /// on to the next tier.
    fn find_pids(&self, path: &Path) -> io::Result<Vec<u32>>;
}

/// Fetches details for a single live process.
pub trait ProcessLookup: Send + Sync {
    /// `None` when the process no longer exists.
    fn process_info(&self, pid: u32) -> Option<ProcessInfo>;
}

/// Two-tier file-to-process resolver.
pub struct ProcessAttributor {
    locators: Vec<Box<dyn OpenFileLocator>>,
    lookup: Box<dyn ProcessLookup>,
}

impl Default for ProcessAttributor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessAttributor {
    /// `lsof`, then `/proc/*/fd`, with details from `sysinfo`.
    pub fn new() -> Self {
        Self::with_tiers(
            vec![Box::new(LsofLocator::new()), Box::new(ProcFdLocator::new())],
            Box::new(SystemProcessLookup::new()),
        )
    }

    /// Build an attributor from explicit tiers, tried in order.
    pub fn with_tiers(
        locators: Vec<Box<dyn OpenFileLocator>>,
        lookup: Box<dyn ProcessLookup>,
    ) -> Self {
        Self { locators, lookup }
    }

    /// Details of a single process, if it is still alive.
    pub fn process_info(&self, pid: u32) -> Option<ProcessInfo> {
        self.lookup.process_info(pid)
    }

    /// Every live process currently holding `path` open.
    ///
    /// Tiers run in order until one yields at least one live process. A
    /// tier that errors, finds nothing, or finds only processes that have
    /// since exited hands over to the next one.
    pub fn find_process_for_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<ProcessInfo>, AttributionError> {
        let target = resolve_target(path.as_ref())?;

        for locator in &self.locators {
            let mut pids = match locator.find_pids(&target) {
                Ok(pids) => pids,
                Err(err) => {
                    debug!("{} unavailable for {}: {err}", locator.name(), target.display());
                    continue;
                }
            };
            pids.sort_unstable();
            pids.dedup();

            if pids.is_empty() {
                debug!("{} found no holders of {}", locator.name(), target.display());
                continue;
            }

            let processes: Vec<ProcessInfo> = pids
                .iter()
                .filter_map(|&pid| {
                    let info = self.lookup.process_info(pid);
                    if info.is_none() {
                        debug!("PID {pid} exited before lookup");
                    }
                    info
                })
                .collect();

            if !processes.is_empty() {
                info!(
                    "{}: {} process(es) hold {}",
                    locator.name(),
                    processes.len(),
                    target.display()
                );
                return Ok(processes);
            }
        }

        Err(AttributionError::NotFound { path: target })
    }
}

/// Absolute, and canonical where possible so it matches descriptor links.
fn resolve_target(path: &Path) -> Result<PathBuf, AttributionError> {
    let absolute = std::path::absolute(path).map_err(|source| AttributionError::InvalidPath {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(std::fs::canonicalize(&absolute).unwrap_or(absolute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct FixedLocator {
        name: &'static str,
        result: Result<Vec<u32>, io::ErrorKind>,
        calls: Arc<Mutex<usize>>,
    }

    impl FixedLocator {
        fn new(name: &'static str, result: Result<Vec<u32>, io::ErrorKind>) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            (
                Self {
                    name,
                    result,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl OpenFileLocator for FixedLocator {
        fn name(&self) -> &'static str {
            self.name
        }

        fn find_pids(&self, _path: &Path) -> io::Result<Vec<u32>> {
            *self.calls.lock() += 1;
            self.result.clone().map_err(io::Error::from)
        }
    }

    struct LivePids(HashSet<u32>);

    impl ProcessLookup for LivePids {
        fn process_info(&self, pid: u32) -> Option<ProcessInfo> {
            self.0.contains(&pid).then(|| ProcessInfo {
                pid,
                name: format!("proc{pid}"),
                ..ProcessInfo::default()
            })
        }
    }

    fn live(pids: &[u32]) -> Box<dyn ProcessLookup> {
        Box::new(LivePids(pids.iter().copied().collect()))
    }

    fn pids_of(result: &[ProcessInfo]) -> Vec<u32> {
        result.iter().map(|p| p.pid).collect()
    }

    #[test]
    fn first_tier_hit_skips_second() {
        let (first, _) = FixedLocator::new("first", Ok(vec![20, 10, 20]));
        let (second, second_calls) = FixedLocator::new("second", Ok(vec![30]));
        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(first), Box::new(second)],
            live(&[10, 20, 30]),
        );

        let found = attributor.find_process_for_file("/var/log/app.log").unwrap();
        assert_eq!(pids_of(&found), vec![10, 20]);
        assert_eq!(*second_calls.lock(), 0);
    }

    #[test]
    fn failing_tier_falls_through() {
        let (first, _) = FixedLocator::new("first", Err(io::ErrorKind::NotFound));
        let (second, second_calls) = FixedLocator::new("second", Ok(vec![30]));
        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(first), Box::new(second)],
            live(&[30]),
        );

        let found = attributor.find_process_for_file("/var/log/app.log").unwrap();
        assert_eq!(pids_of(&found), vec![30]);
        assert_eq!(*second_calls.lock(), 1);
    }

    #[test]
    fn empty_tier_falls_through() {
        let (first, _) = FixedLocator::new("first", Ok(Vec::new()));
        let (second, _) = FixedLocator::new("second", Ok(vec![7]));
        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(first), Box::new(second)],
            live(&[7]),
        );
        assert_eq!(
            pids_of(&attributor.find_process_for_file("/f").unwrap()),
            vec![7]
        );
    }

    /// Processes that exit between discovery and lookup are dropped.
    #[test]
    fn exited_processes_are_dropped() {
        let (first, _) = FixedLocator::new("first", Ok(vec![1, 2, 3]));
        let attributor = ProcessAttributor::with_tiers(vec![Box::new(first)], live(&[2]));
        assert_eq!(
            pids_of(&attributor.find_process_for_file("/f").unwrap()),
            vec![2]
        );
    }

    #[test]
    fn stale_first_tier_consults_second() {
        let (first, _) = FixedLocator::new("first", Ok(vec![99]));
        let (second, _) = FixedLocator::new("second", Ok(vec![5]));
        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(first), Box::new(second)],
            live(&[5]),
        );
        assert_eq!(
            pids_of(&attributor.find_process_for_file("/f").unwrap()),
            vec![5]
        );
    }

    #[test]
    fn nothing_found_is_not_found_error() {
        let (first, _) = FixedLocator::new("first", Ok(Vec::new()));
        let (second, _) = FixedLocator::new("second", Err(io::ErrorKind::PermissionDenied));
        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(first), Box::new(second)],
            live(&[]),
        );
        let err = attributor.find_process_for_file("/no/such.log").unwrap_err();
        assert!(matches!(err, AttributionError::NotFound { .. }));
    }

    #[test]
    fn relative_paths_are_made_absolute() {
        let seen = Arc::new(Mutex::new(None));

        struct Recorder(Arc<Mutex<Option<PathBuf>>>);
        impl OpenFileLocator for Recorder {
            fn name(&self) -> &'static str {
                "recorder"
            }
            fn find_pids(&self, path: &Path) -> io::Result<Vec<u32>> {
                *self.0.lock() = Some(path.to_path_buf());
                Ok(Vec::new())
            }
        }

        let attributor = ProcessAttributor::with_tiers(
            vec![Box::new(Recorder(Arc::clone(&seen)))],
            live(&[]),
        );
        let _ = attributor.find_process_for_file("relative/app.log");
        let path = seen.lock().clone().unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("relative/app.log"));
    }
}

use super::OpenFileLocator;
use crate::platform::{self, DEFAULT_PROC_ROOT};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Tier 2: walk every `<proc_root>/<pid>/fd` and compare link targets.
///
/// Processes that exit mid-scan or whose descriptor table is not readable
/// are skipped.
#[derive(Debug, Clone)]
pub struct ProcFdLocator {
    proc_root: PathBuf,
}

impl Default for ProcFdLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFdLocator {
    pub fn new() -> Self {
        Self::with_proc_root(DEFAULT_PROC_ROOT)
    }

    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl OpenFileLocator for ProcFdLocator {
    fn name(&self) -> &'static str {
        "proc-fd"
    }

    fn find_pids(&self, path: &Path) -> io::Result<Vec<u32>> {
        let pids = platform::list_pids(&self.proc_root)?;
        let mut holders = Vec::new();

        for pid in pids {
            match platform::fd_targets(&self.proc_root, pid) {
                Ok(targets) => {
                    if targets.iter().any(|t| t == path) {
                        holders.push(pid);
                    }
                }
                Err(err) => trace!("skipping fds of {pid}: {err}"),
            }
        }
        Ok(holders)
    }
}

/// Process and service attribution records.
///
/// Both are best-effort snapshots of live system state and go stale the
/// moment they are captured. Nothing here tracks lifecycle.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status reported for services synthesised by the ancestry heuristic.
pub const FALLBACK_STATUS: &str = "unknown (fallback)";

/// A live process found holding a file open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Full command line, arguments joined by single spaces.
    pub cmdline: String,
    /// Executable path, empty when unreadable.
    pub exe: String,
    /// Owning user name, or the numeric UID when it has no passwd entry.
    pub user: String,
    pub start_time: Option<DateTime<Utc>>,
    pub cpu_percent: f32,
    /// Resident set size in MiB.
    pub memory_mb: f64,
    /// Bytes written to storage over the process lifetime.
    pub write_bytes: u64,
}

/// The managed service a process belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Unit identifier, e.g. `nginx.service`.
    pub unit: String,
    /// Activation state, or [`FALLBACK_STATUS`] when guessed.
    pub status: String,
    pub main_pid: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub description: String,
}

impl ServiceInfo {
    /// `true` if this record came from the ancestry heuristic rather than
    /// the service manager.
    pub fn is_fallback(&self) -> bool {
        self.status == FALLBACK_STATUS
    }
}

/// Derived growth records and the scan result consumed by renderers.
use super::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Byte growth of one file between two snapshots.
///
/// Always satisfies `growth_bytes == final_size - initial_size`; files that
/// were absent from the earlier snapshot have `initial_size == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGrowth {
    #[serde(with = "crate::model::os_path")]
    pub path: PathBuf,
    pub initial_size: u64,
    pub final_size: u64,
    pub growth_bytes: u64,
    /// Bytes per second over `interval`.
    pub growth_rate: f64,
    pub interval: Duration,
}

impl FileGrowth {
    pub fn severity(&self) -> Severity {
        Severity::from_rate(self.growth_rate)
    }
}

/// Write-rate classification used for colouring output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Under 1 MiB/s.
    Low,
    /// 1 MiB/s up to 10 MiB/s.
    Medium,
    /// 10 MiB/s and above.
    High,
}

impl Severity {
    /// Classify a growth rate in bytes per second.
    pub fn from_rate(bytes_per_sec: f64) -> Self {
        let mib_per_sec = bytes_per_sec / MIB;
        if mib_per_sec >= 10.0 {
            Self::High
        } else if mib_per_sec >= 1.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Outcome of a full two-snapshot scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Configured wait between the two snapshots.
    pub interval: Duration,
    pub snapshot1: Snapshot,
    pub snapshot2: Snapshot,
    /// Files over the threshold, fastest-growing first.
    pub growing_files: Vec<FileGrowth>,
    /// Sum of `growth_bytes` across `growing_files`.
    pub total_growth: u64,
    #[serde(with = "crate::model::os_path::vec")]
    pub paths: Vec<PathBuf>,
}

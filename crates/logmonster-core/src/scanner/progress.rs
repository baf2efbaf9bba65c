/// Scan progress reporting: lightweight messages sent from the background
/// scan thread to whatever is displaying it, via a crossbeam channel.
use crate::model::ScanResult;
use std::time::Duration;

/// Progress updates sent from the scan thread.
#[derive(Debug)]
pub enum ScanProgress {
    /// Snapshot `index` (1 or 2) finished.
    SnapshotTaken {
        index: u8,
        file_count: u64,
        total_size: u64,
        duration: Duration,
    },
    /// Sleeping between the two snapshots.
    Waiting { interval: Duration },
    /// Scan finished; carries the full result.
    Complete(Box<ScanResult>),
    /// Scan was cancelled.
    Cancelled,
    /// Scan failed outright (e.g. a root vanished).
    Failed(String),
}

impl ScanProgress {
    /// `true` for messages after which no further messages arrive.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete(_) | Self::Cancelled | Self::Failed(_)
        )
    }
}

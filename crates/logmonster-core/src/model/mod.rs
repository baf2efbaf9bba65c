/// Data model shared by every engine.
///
/// Re-exports the snapshot, growth and attribution record types plus the
/// formatting helpers renderers use.
pub mod growth;
pub mod os_path;
pub mod process;
pub mod size;
pub mod snapshot;

pub use growth::{FileGrowth, ScanResult, Severity};
pub use process::{ProcessInfo, ServiceInfo, FALLBACK_STATUS};
pub use snapshot::{FileInfo, Snapshot};

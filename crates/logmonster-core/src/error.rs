//! Error types for each engine.
//!
//! Per-item failures inside batch work (a file that vanished mid-walk, a
//! process that exited during an fd scan) never reach these types; they are
//! dropped at the point of failure. Only whole-operation failures surface.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building snapshots or running a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A configured root could not be stat'ed at all.
    #[error("cannot access scan root {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shared cancellation token fired before the operation finished.
    #[error("scan cancelled")]
    Cancelled,

    /// An exclude glob could not be compiled.
    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    /// A scanner thread could not be started.
    #[error("failed to spawn scanner thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised by snapshot persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while attributing a file to processes.
#[derive(Error, Debug)]
pub enum AttributionError {
    /// No live process holds the file open.
    #[error("no process found with file open: {}", path.display())]
    NotFound { path: PathBuf },

    /// The target path could not be made absolute.
    #[error("invalid path {}: {source}", path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while resolving a PID to a managed service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Neither the service manager nor the ancestry heuristic matched.
    #[error("could not resolve PID {pid} to a service")]
    NotFound { pid: u32 },

    /// The service manager could not be reached.
    #[error("service manager unavailable: {0}")]
    Unavailable(String),

    /// The service manager has no such unit.
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    /// The service manager answered, but not with something usable.
    #[error("query for {unit} failed: {reason}")]
    Query { unit: String, reason: String },
}

/// Errors raised by the termination path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminationError {
    /// No process with this PID exists (only surfaced by direct signals).
    #[error("process not found: {pid}")]
    NotFound { pid: u32 },

    /// The signal could not be delivered at all (e.g. permission denied).
    #[error("failed to send {signal} to {pid}: {reason}")]
    SignalFailed {
        pid: u32,
        signal: String,
        reason: String,
    },

    /// The process survived the force-kill grace period.
    #[error("process {pid} still running after SIGKILL")]
    StillRunning { pid: u32 },

    /// Cancelled while waiting on the process.
    #[error("termination of {pid} cancelled")]
    Cancelled { pid: u32 },
}

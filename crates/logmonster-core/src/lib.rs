/// LogMonster Core: log growth detection, attribution, and termination.
///
/// This crate contains all business logic with zero UI dependencies.
/// It is designed to be reusable across different frontends (CLI, TUI, daemon).
///
/// # Modules
///
/// - [`model`]: Snapshots, growth records, process and service records.
/// - [`scanner`]: Parallel snapshot engine, two-snapshot scans, persistence.
/// - [`analysis`]: Snapshot diffing into ranked growth records.
/// - [`attribution`]: Which processes hold a file open.
/// - [`service`]: Which managed service a process belongs to.
/// - [`termination`]: Graceful-then-forced process shutdown.
/// - [`platform`]: Linux procfs readers.
/// - [`cancel`]: Cooperative cancellation with wakeable sleeps.
/// - [`error`]: Error types for each engine.
pub mod analysis;
pub mod attribution;
pub mod cancel;
pub mod error;
pub mod model;
pub mod platform;
pub mod scanner;
pub mod service;
pub mod termination;

pub use cancel::CancelToken;

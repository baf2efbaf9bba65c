/// Platform-specific functionality: Linux procfs readers shared by the
/// attribution and service tiers.

pub mod procfs;

pub use procfs::{fd_targets, list_pids, read_comm, read_parent_pid, DEFAULT_PROC_ROOT};

/// Analysis modules: post-scan algorithms over snapshots.

pub mod growth;

pub use growth::{diff, filter_by_rate, total_growth, MIN_INTERVAL};

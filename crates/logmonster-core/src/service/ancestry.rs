use super::ServiceStrategy;
use crate::error::ServiceError;
use crate::model::{ServiceInfo, FALLBACK_STATUS};
use crate::platform::{self, DEFAULT_PROC_ROOT};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Command-name substrings of well-known long-running services.
pub const SERVICE_CATALOGUE: &[&str] = &[
    "apache2",
    "nginx",
    "mysql",
    "postgres",
    "redis",
    "docker",
    "containerd",
    "tomcat",
    "java",
    "node",
    "python",
    "php",
    "ruby",
    "mongod",
    "elasticsearch",
];

/// Upper bound on parent hops, in case a fake or racing tree loops.
const MAX_ANCESTRY_HOPS: usize = 64;

/// Fallback tier: walk the parent chain and guess the service from the first
/// ancestor whose command name matches [`SERVICE_CATALOGUE`].
#[derive(Debug, Clone)]
pub struct AncestryStrategy {
    proc_root: PathBuf,
}

impl Default for AncestryStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl AncestryStrategy {
    pub fn new() -> Self {
        Self::with_proc_root(DEFAULT_PROC_ROOT)
    }

    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

fn matches_catalogue(comm: &str) -> bool {
    let lower = comm.to_lowercase();
    SERVICE_CATALOGUE.iter().any(|name| lower.contains(name))
}

impl ServiceStrategy for AncestryStrategy {
    fn name(&self) -> &'static str {
        "ancestry"
    }

    fn resolve(&self, pid: u32) -> Result<ServiceInfo, ServiceError> {
        let mut current = pid;
        let mut visited = HashSet::new();

        for _ in 0..MAX_ANCESTRY_HOPS {
            if current <= 1 || !visited.insert(current) {
                break;
            }

            match platform::read_comm(&self.proc_root, current) {
                Ok(comm) if matches_catalogue(&comm) => {
                    debug!("PID {pid}: ancestor {current} ({comm}) matches a known service");
                    return Ok(ServiceInfo {
                        unit: format!("{comm}.service"),
                        status: FALLBACK_STATUS.to_string(),
                        main_pid: current,
                        start_time: None,
                        description: String::new(),
                    });
                }
                Ok(_) => {}
                Err(err) => trace!("no comm for {current}: {err}"),
            }

            match platform::read_parent_pid(&self.proc_root, current) {
                Ok(parent) => current = parent,
                Err(err) => {
                    trace!("ancestry of {pid} ends at {current}: {err}");
                    break;
                }
            }
        }

        Err(ServiceError::NotFound { pid })
    }
}

/// Service resolution: maps a PID to the managed service it belongs to.
///
/// Tiers are tried in order: the service manager first, then the ancestry
/// heuristic. Any tier failure falls through to the next; only when every
/// tier fails does the caller see [`ServiceError::NotFound`].
pub mod ancestry;
pub mod systemd;

pub use ancestry::{AncestryStrategy, SERVICE_CATALOGUE};
pub use systemd::{ServiceManager, Systemctl, UnitProperties};

use crate::error::ServiceError;
use crate::model::ServiceInfo;
use crate::platform::DEFAULT_PROC_ROOT;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One strategy for attributing a PID to a service.
pub trait ServiceStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn resolve(&self, pid: u32) -> Result<ServiceInfo, ServiceError>;
}

/// Tier 1: ask the service manager which unit owns the PID.
pub struct ManagerStrategy {
    manager: Arc<dyn ServiceManager>,
}

impl ManagerStrategy {
    pub fn new(manager: Arc<dyn ServiceManager>) -> Self {
        Self { manager }
    }
}

impl ServiceStrategy for ManagerStrategy {
    fn name(&self) -> &'static str {
        "service-manager"
    }

    /// Fails only with `Unavailable` or `NotFound`.
    fn resolve(&self, pid: u32) -> Result<ServiceInfo, ServiceError> {
        let unit = self.manager.unit_for_pid(pid)?;
        let props = self.manager.unit_properties(&unit).map_err(|err| match err {
            ServiceError::Unavailable(reason) => ServiceError::Unavailable(reason),
            _ => ServiceError::NotFound { pid },
        })?;

        Ok(ServiceInfo {
            unit: if props.id.is_empty() { unit } else { props.id },
            status: props.active_state,
            main_pid: props.main_pid,
            start_time: props.active_enter,
            description: props.description,
        })
    }
}

/// Resolves PIDs to services and answers unit status queries.
pub struct ServiceResolver {
    manager: Arc<dyn ServiceManager>,
    tiers: Vec<Box<dyn ServiceStrategy>>,
}

impl Default for ServiceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceResolver {
    /// `systemctl`, falling back to ancestry under `/proc`.
    pub fn new() -> Self {
        Self::with_manager(Arc::new(Systemctl::new()), DEFAULT_PROC_ROOT)
    }

    /// Standard two-tier chain around an explicit manager and procfs root.
    pub fn with_manager(manager: Arc<dyn ServiceManager>, proc_root: impl Into<PathBuf>) -> Self {
        let tiers: Vec<Box<dyn ServiceStrategy>> = vec![
            Box::new(ManagerStrategy::new(Arc::clone(&manager))),
            Box::new(AncestryStrategy::with_proc_root(proc_root)),
        ];
        Self::with_tiers(manager, tiers)
    }

    /// Fully custom chain. `manager` still answers the unit queries.
    pub fn with_tiers(manager: Arc<dyn ServiceManager>, tiers: Vec<Box<dyn ServiceStrategy>>) -> Self {
        Self { manager, tiers }
    }

    /// The service that owns `pid`.
    pub fn resolve_service(&self, pid: u32) -> Result<ServiceInfo, ServiceError> {
        for tier in &self.tiers {
            match tier.resolve(pid) {
                Ok(info) => {
                    info!("PID {pid} resolved to {} via {}", info.unit, tier.name());
                    return Ok(info);
                }
                Err(err) => debug!("{} could not resolve PID {pid}: {err}", tier.name()),
            }
        }
        Err(ServiceError::NotFound { pid })
    }

    /// Activation state of `unit`, from the service manager only.
    pub fn get_service_status(&self, unit: &str) -> Result<String, ServiceError> {
        self.manager.unit_properties(unit).map(|p| p.active_state)
    }

    /// When `unit` last became active, from the service manager only.
    ///
    /// `Ok(None)` when the unit exists but has never been active.
    pub fn get_service_start_time(&self, unit: &str) -> Result<Option<DateTime<Utc>>, ServiceError> {
        self.manager.unit_properties(unit).map(|p| p.active_enter)
    }
}

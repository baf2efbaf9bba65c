use super::{Delivery, LivenessProbe, Signal, SignalSender};
use crate::error::TerminationError;
use parking_lot::{Mutex, MutexGuard};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// Liveness and signal delivery through `sysinfo`.
///
/// Zombies count as exited: they hold no resources worth waiting for and
/// only disappear once their parent reaps them.
pub struct SystemSignals {
    system: Mutex<System>,
}

impl Default for SystemSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn refreshed(&self, pid: Pid) -> MutexGuard<'_, System> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
    }
}

fn is_running(system: &System, pid: Pid) -> bool {
    system
        .process(pid)
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

impl LivenessProbe for SystemSignals {
    fn is_alive(&self, pid: u32) -> bool {
        let spid = Pid::from_u32(pid);
        is_running(&self.refreshed(spid), spid)
    }
}

impl SignalSender for SystemSignals {
    fn send(&self, pid: u32, signal: Signal) -> Result<Delivery, TerminationError> {
        let spid = Pid::from_u32(pid);
        let system = self.refreshed(spid);
        if !is_running(&system, spid) {
            return Ok(Delivery::NoSuchProcess);
        }
        let Some(process) = system.process(spid) else {
            return Ok(Delivery::NoSuchProcess);
        };

        match process.kill_with(signal) {
            Some(true) => Ok(Delivery::Delivered),
            Some(false) => {
                // kill(2) failed: either the process exited in the meantime
                // or we may not signal it.
                drop(system);
                if self.is_alive(pid) {
                    Err(TerminationError::SignalFailed {
                        pid,
                        signal: format!("{signal:?}"),
                        reason: "permission denied".into(),
                    })
                } else {
                    Ok(Delivery::NoSuchProcess)
                }
            }
            None => Err(TerminationError::SignalFailed {
                pid,
                signal: format!("{signal:?}"),
                reason: "signal not supported on this platform".into(),
            }),
        }
    }
}

use super::ProcessLookup;
use crate::model::ProcessInfo;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, Users};

/// [`ProcessLookup`] backed by `sysinfo`.
///
/// The `System` is kept between calls so CPU usage has a previous sample to
/// compare against; the first lookup of a PID reports 0 %.
pub struct SystemProcessLookup {
    system: Mutex<System>,
    users: Users,
}

impl Default for SystemProcessLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProcessLookup {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            users: Users::new_with_refreshed_list(),
        }
    }

    fn user_name(&self, process: &sysinfo::Process) -> String {
        let Some(uid) = process.user_id() else {
            return String::new();
        };
        self.users
            .get_user_by_id(uid)
            .map(|user| user.name().to_string())
            .unwrap_or_else(|| (**uid).to_string())
    }
}

impl ProcessLookup for SystemProcessLookup {
    fn process_info(&self, pid: u32) -> Option<ProcessInfo> {
        let spid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[spid]),
            true,
            ProcessRefreshKind::everything(),
        );

        let process = system.process(spid)?;
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return None;
        }

        let cmdline = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        Some(ProcessInfo {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            cmdline,
            exe: process
                .exe()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            user: self.user_name(process),
            start_time: match process.start_time() {
                0 => None,
                secs => DateTime::<Utc>::from_timestamp(secs as i64, 0),
            },
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
            write_bytes: process.disk_usage().total_written_bytes,
        })
    }
}

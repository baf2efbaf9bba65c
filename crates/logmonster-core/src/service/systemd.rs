//! `systemctl`-backed service manager queries.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::process::{Command, Output};
use tracing::debug;

/// Suffixes systemd gives unit identifiers.
const UNIT_SUFFIXES: &[&str] = &[
    ".service", ".scope", ".slice", ".socket", ".mount", ".timer", ".target", ".swap", ".path",
];

const SHOW_PROPERTIES: &str = "Id,LoadState,ActiveState,MainPID,Description,ActiveEnterTimestamp";

/// Properties read back for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitProperties {
    pub id: String,
    pub load_state: String,
    pub active_state: String,
    pub main_pid: u32,
    pub description: String,
    /// When the unit last entered the active state.
    pub active_enter: Option<DateTime<Utc>>,
}

/// The local service manager's management interface.
pub trait ServiceManager: Send + Sync {
    /// The unit that owns `pid`.
    fn unit_for_pid(&self, pid: u32) -> Result<String, ServiceError>;

    /// Current properties of `unit`.
    fn unit_properties(&self, unit: &str) -> Result<UnitProperties, ServiceError>;
}

/// [`ServiceManager`] that shells out to `systemctl`.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: OsString,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new()
    }
}

impl Systemctl {
    pub fn new() -> Self {
        Self::with_program("systemctl")
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, ServiceError> {
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| ServiceError::Unavailable(format!("failed to execute systemctl: {e}")))
    }

    fn show(&self, unit: &str, unix_timestamps: bool) -> Result<Output, ServiceError> {
        let property = format!("--property={SHOW_PROPERTIES}");
        let mut args = vec!["show", unit, property.as_str(), "--no-pager"];
        if unix_timestamps {
            args.push("--timestamp=unix");
        }
        self.run(&args)
    }
}

impl ServiceManager for Systemctl {
    fn unit_for_pid(&self, pid: u32) -> Result<String, ServiceError> {
        let pid_arg = pid.to_string();
        let output = self.run(&["status", &pid_arg, "--no-pager", "--lines=0"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if let Some(unit) = stdout.lines().next().and_then(unit_from_status_line) {
            return Ok(unit);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_bus_failure(&stderr) {
            return Err(ServiceError::Unavailable(stderr.trim().to_string()));
        }
        debug!("systemctl has no unit for PID {pid}: {}", stderr.trim());
        Err(ServiceError::NotFound { pid })
    }

    fn unit_properties(&self, unit: &str) -> Result<UnitProperties, ServiceError> {
        if !is_valid_unit_name(unit) {
            return Err(ServiceError::UnitNotFound(unit.to_string()));
        }

        let mut output = self.show(unit, true)?;
        if !output.status.success()
            && String::from_utf8_lossy(&output.stderr).contains("--timestamp")
        {
            // systemd older than 248 has no --timestamp; activation time is
            // then left unset.
            output = self.show(unit, false)?;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_bus_failure(&stderr) {
                return Err(ServiceError::Unavailable(stderr));
            }
            return Err(ServiceError::Query {
                unit: unit.to_string(),
                reason: stderr,
            });
        }

        let props = parse_show_output(&String::from_utf8_lossy(&output.stdout));
        if props.load_state == "not-found" {
            return Err(ServiceError::UnitNotFound(unit.to_string()));
        }
        Ok(props)
    }
}

fn is_bus_failure(stderr: &str) -> bool {
    stderr.contains("Failed to connect to bus")
        || stderr.contains("has not been booted with systemd")
        || stderr.contains("Failed to get D-Bus connection")
}

/// Unit names are passed as a plain argument, but a leading `-` would still
/// be read as an option.
fn is_valid_unit_name(unit: &str) -> bool {
    !unit.is_empty()
        && !unit.starts_with('-')
        && unit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | ':' | '-' | '\\'))
}

/// First token of a `systemctl status` header that looks like a unit id.
///
/// The header reads `● nginx.service - A high performance web server`.
fn unit_from_status_line(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|token| UNIT_SUFFIXES.iter().any(|suffix| token.ends_with(suffix)))
        .map(str::to_string)
}

/// Parse `Key=Value` lines from `systemctl show`.
fn parse_show_output(output: &str) -> UnitProperties {
    let mut props = UnitProperties::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Id" => props.id = value.to_string(),
            "LoadState" => props.load_state = value.to_string(),
            "ActiveState" => props.active_state = value.to_string(),
            "MainPID" => props.main_pid = value.parse().unwrap_or(0),
            "Description" => props.description = value.to_string(),
            "ActiveEnterTimestamp" => props.active_enter = parse_unix_timestamp(value),
            _ => {}
        }
    }
    props
}

/// `@1700000000` as printed with `--timestamp=unix`. Zero means "never".
fn parse_unix_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = value.strip_prefix('@')?.parse().ok()?;
    if secs <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
}

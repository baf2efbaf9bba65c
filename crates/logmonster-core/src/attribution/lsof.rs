use super::OpenFileLocator;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

/// Tier 1: ask `lsof -t <path>` for the PIDs holding a file open.
#[derive(Debug, Clone)]
pub struct LsofLocator {
    program: OsString,
}

impl Default for LsofLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LsofLocator {
    pub fn new() -> Self {
        Self::with_program("lsof")
    }

    /// Use a specific `lsof` binary.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OpenFileLocator for LsofLocator {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn find_pids(&self, path: &Path) -> io::Result<Vec<u32>> {
        let output = Command::new(&self.program).arg("-t").arg(path).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // lsof exits 1 both for "no matches" and for real failures; only the
        // latter writes to stderr without producing any PIDs.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.trim().is_empty() {
                return Ok(Vec::new());
            }
            return Err(io::Error::other(format!("lsof failed: {}", stderr.trim())));
        }

        Ok(parse_pid_lines(&stdout))
    }
}

/// One PID per line; anything unparseable is ignored.
fn parse_pid_lines(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}

//! Direct procfs readers.
//!
//! Every function takes the procfs root explicitly so callers (and tests)
//! can point them at a fake tree. Failures are returned as plain
//! `io::Error`s; the callers decide whether a missing entry is a skip.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The live procfs mount.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Upper bound on bytes read from `comm` or `stat`.
const MAX_PROC_FILE_BYTES: usize = 64 * 1024;

fn read_bounded(path: &Path) -> io::Result<String> {
    let data = fs::read(path)?;
    let end = data.len().min(MAX_PROC_FILE_BYTES);
    Ok(String::from_utf8_lossy(&data[..end]).into_owned())
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Read `<proc_root>/<pid>/comm`, trimmed.
pub fn read_comm(proc_root: &Path, pid: u32) -> io::Result<String> {
    let content = read_bounded(&proc_root.join(pid.to_string()).join("comm"))?;
    Ok(content.trim().to_string())
}

/// Parent PID from `<proc_root>/<pid>/stat`.
///
/// The command name in field 2 may itself contain spaces and parentheses,
/// so fields are counted from the last `)`.
pub fn read_parent_pid(proc_root: &Path, pid: u32) -> io::Result<u32> {
    let content = read_bounded(&proc_root.join(pid.to_string()).join("stat"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| invalid(format!("malformed stat for {pid}: no ')'")))?;

    // After ')': state ppid pgrp ...
    let ppid = content[close + 1..]
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| invalid(format!("malformed stat for {pid}: missing ppid")))?;
    ppid.parse::<u32>()
        .map_err(|_| invalid(format!("malformed stat for {pid}: ppid '{ppid}'")))
}

/// Numeric entries of `proc_root`, i.e. the PIDs visible there.
pub fn list_pids(proc_root: &Path) -> io::Result<Vec<u32>> {
    let mut pids: Vec<u32> = fs::read_dir(proc_root)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Resolved link targets of every descriptor in `<proc_root>/<pid>/fd`.
///
/// Descriptors that close between listing and `readlink` are skipped. An
/// error is returned only when the fd directory itself cannot be read.
pub fn fd_targets(proc_root: &Path, pid: u32) -> io::Result<Vec<PathBuf>> {
    let fd_dir = proc_root.join(pid.to_string()).join("fd");
    let targets = fs::read_dir(fd_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| fs::read_link(entry.path()).ok())
        .collect();
    Ok(targets)
}

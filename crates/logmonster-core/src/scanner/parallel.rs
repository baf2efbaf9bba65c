/// Concurrent snapshot engine.
///
/// Three roles run at once inside a `std::thread::scope`:
///
/// - **Producer**: one thread drives a `jwalk` traversal of each root in
///   turn, prunes excluded names and (unless configured otherwise) symlinks,
///   and pushes candidate file paths into a bounded path queue.
/// - **Workers**: a fixed pool stats each path and pushes a `FileInfo`
///   into a bounded result queue. Stat failures are skipped silently.
/// - **Aggregator**: the calling thread drains the result queue into the
///   snapshot's map. It is the only writer, so no lock guards the map.
///
/// # Cancellation
///
/// The shared [`CancelToken`] is checked on every directory read, on every
/// entry the producer yields, before every queue send and before every item
/// a worker takes. The
/// producer sends with a short timeout so it never blocks forever on a full
/// queue whose workers have already quit. The aggregator keeps draining the
/// result queue until every worker has dropped its sender, so no worker can
/// deadlock on an unread queue. The scope joins every thread before this
/// function returns.
use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::model::{FileInfo, Snapshot};
use crate::scanner::filters::ExcludeFilter;
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use jwalk::{Parallelism, WalkDir};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Capacity of the producer → worker path queue.
pub const PATH_CHANNEL_CAPACITY: usize = 1_000;

/// Capacity of the worker → aggregator result queue.
pub const RESULT_CHANNEL_CAPACITY: usize = 1_000;

/// How long a blocked producer waits before re-checking cancellation.
const SEND_POLL: Duration = Duration::from_millis(50);

/// Walk parameters, already validated.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Maximum recursion depth below each root; `0` means unlimited.
    pub max_depth: usize,
    pub follow_symlinks: bool,
    /// Number of stat workers; clamped to at least one.
    pub workers: usize,
}

/// Take one snapshot of every file under `roots`.
///
/// Fails only when a root cannot be stat'ed at all or when `cancel` fires.
/// Everything else (unreadable subdirectories, files deleted mid-walk) is
/// dropped and the snapshot is a best-effort partial result.
pub fn take_snapshot(
    roots: &[PathBuf],
    filter: &ExcludeFilter,
    options: &WalkOptions,
    cancel: &CancelToken,
) -> Result<Snapshot, ScanError> {
    let start = Instant::now();
    let timestamp = Utc::now();

    let roots = resolve_roots(roots)?;
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }

    let workers = options.workers.max(1);
    let roots = &roots;

    let files = thread::scope(|s| -> Result<HashMap<PathBuf, FileInfo>, ScanError> {
        let (path_tx, path_rx) = bounded::<PathBuf>(PATH_CHANNEL_CAPACITY);
        let (result_tx, result_rx) = bounded::<FileInfo>(RESULT_CHANNEL_CAPACITY);

        for i in 0..workers {
            let rx = path_rx.clone();
            let tx = result_tx.clone();
            let follow = options.follow_symlinks;
            thread::Builder::new()
                .name(format!("logmonster-stat-{i}"))
                .spawn_scoped(s, move || stat_worker(rx, tx, follow, cancel))
                .map_err(ScanError::Spawn)?;
        }
        // Only workers hold these now; their exit closes the queues.
        drop(path_rx);
        drop(result_tx);

        let walker = Walker {
            filter,
            options,
            cancel,
        };
        thread::Builder::new()
            .name("logmonster-walk".into())
            .spawn_scoped(s, move || walker.run(roots, path_tx))
            .map_err(ScanError::Spawn)?;

        let mut files: HashMap<PathBuf, FileInfo> = HashMap::new();
        for info in result_rx.iter() {
            files.insert(info.path.clone(), info);
        }
        Ok(files)
    })?;

    if cancel.is_cancelled() {
        debug!("Snapshot cancelled after {:?}", start.elapsed());
        return Err(ScanError::Cancelled);
    }

    let snapshot = Snapshot::from_files(timestamp, files.into_values());
    debug!(
        "Snapshot complete: {} files, {} bytes in {:?}",
        snapshot.file_count(),
        snapshot.total_size(),
        start.elapsed()
    );
    Ok(snapshot)
}

/// Normalise each root to an absolute path and make sure it exists.
fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let mut resolved = Vec::with_capacity(roots.len());
    for root in roots {
        let abs = std::path::absolute(root).map_err(|source| ScanError::RootInaccessible {
            path: root.clone(),
            source,
        })?;
        fs::metadata(&abs).map_err(|source| ScanError::RootInaccessible {
            path: abs.clone(),
            source,
        })?;
        if !resolved.contains(&abs) {
            resolved.push(abs);
        }
    }
    Ok(resolved)
}

/// Stat worker: take paths until the queue closes or cancellation fires.
fn stat_worker(
    paths: Receiver<PathBuf>,
    results: Sender<FileInfo>,
    follow_symlinks: bool,
    cancel: &CancelToken,
) {
    for path in paths.iter() {
        if cancel.is_cancelled() {
            break;
        }
        let meta = if follow_symlinks {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        match meta {
            Ok(meta) => {
                if results.send(FileInfo::from_metadata(path, &meta)).is_err() {
                    break;
                }
            }
            Err(err) => trace!("skip {}: {err}", path.display()),
        }
    }
}

/// Outcome of one producer step.
#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The single producer.
struct Walker<'a> {
    filter: &'a ExcludeFilter,
    options: &'a WalkOptions,
    cancel: &'a CancelToken,
}

impl Walker<'_> {
    fn run(&self, roots: &[PathBuf], tx: Sender<PathBuf>) {
        for root in roots {
            if self.cancel.is_cancelled() || self.walk_root(root, &tx) == Flow::Stop {
                return;
            }
        }
    }

    /// Walk one root to its own depth limit and queue every non-directory.
    fn walk_root(&self, root: &Path, tx: &Sender<PathBuf>) -> Flow {
        let root_is_dir = root.is_dir();
        for entry_result in self.walk_dir(root) {
            if self.cancel.is_cancelled() {
                return Flow::Stop;
            }
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                    trace!("skip {path}: {err}");
                    continue;
                }
            };
            if entry.file_type().is_dir() || (entry.depth == 0 && root_is_dir) {
                continue;
            }
            if self.send(tx, entry.path()) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Configure the jwalk traversal for one root.
    ///
    /// Directory reads run serially on the producer thread; the stat pool
    /// supplies the parallelism. Excluded names, and unfollowed symlinks,
    /// are pruned per directory before jwalk descends into them. Once
    /// cancelled, every directory read comes back empty.
    fn walk_dir(&self, root: &Path) -> WalkDir {
        let filter = self.filter.clone();
        let cancel = self.cancel.clone();
        let follow = self.options.follow_symlinks;

        let walker = WalkDir::new(root)
            .skip_hidden(false)
            .sort(false)
            .follow_links(follow)
            .parallelism(Parallelism::Serial)
            .process_read_dir(move |_depth, _dir, _state, children| {
                if cancel.is_cancelled() {
                    children.clear();
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) => {
                        !filter.is_excluded(&entry.file_name().to_string_lossy())
                            && (follow || !entry.file_type().is_symlink())
                    }
                    // Kept so the producer can log it.
                    Err(_) => true,
                });
            });

        // jwalk counts the root as depth 0; our depth 0 is the root's entries.
        match self.options.max_depth {
            0 => walker,
            depth => walker.max_depth(depth + 1),
        }
    }

    /// Push a path, waking periodically to honour cancellation.
    fn send(&self, tx: &Sender<PathBuf>, path: PathBuf) -> Flow {
        let mut item = path;
        loop {
            if self.cancel.is_cancelled() {
                return Flow::Stop;
            }
            match tx.send_timeout(item, SEND_POLL) {
                Ok(()) => return Flow::Continue,
                Err(SendTimeoutError::Timeout(back)) => item = back,
                // Every worker is gone; nothing left to feed.
                Err(SendTimeoutError::Disconnected(_)) => return Flow::Stop,
            }
        }
    }
}

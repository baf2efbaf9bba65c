use logmonster_core::analysis;
use logmonster_core::error::ScanError;
use logmonster_core::scanner::progress::ScanProgress;
/// End-to-end scanner integration tests.
///
/// These tests exercise the real snapshot pipeline (producer thread, stat
/// worker pool, aggregator) and the background `start_scan` thread against
/// a real temporary filesystem, verifying that snapshots see every file,
/// honour exclusions and depth limits, and that two-snapshot scans report
/// files written to between the snapshots.
use logmonster_core::scanner::{
    start_scan, ScanConfig, ScanHandle, Scanner, SnapshotStore, PROGRESS_CHANNEL_CAPACITY,
};
use logmonster_core::CancelToken;
use std::fs::{self, OpenOptions};
use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Create a reproducible log tree for scanner tests:
///
/// ```text
/// root/
///   app/
///     app.log        (100 bytes)
///     app.log.1.gz   (200 bytes)
///   nginx/
///     access.log     (300 bytes)
///     deep/er/old.log (50 bytes)
///   syslog           (400 bytes)
/// ```
fn build_test_tree(root: &Path) {
    let app = root.join("app");
    let nginx = root.join("nginx");
    fs::create_dir_all(&app).unwrap();
    fs::create_dir_all(nginx.join("deep/er")).unwrap();

    write_bytes(&app.join("app.log"), 100);
    write_bytes(&app.join("app.log.1.gz"), 200);
    write_bytes(&nginx.join("access.log"), 300);
    write_bytes(&nginx.join("deep/er/old.log"), 50);
    write_bytes(&root.join("syslog"), 400);
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![b'x'; n]).unwrap();
}

fn append_bytes(path: &Path, n: usize) {
    let mut f = OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(&vec![b'y'; n]).unwrap();
}

fn config_for(root: &Path) -> ScanConfig {
    ScanConfig {
        paths: vec![root.to_path_buf()],
        interval: Duration::from_millis(200),
        threshold_bytes: 1,
        worker_count: 4,
        ..ScanConfig::default()
    }
}

/// Drain progress messages until a terminal one arrives, returning it.
///
/// Waits up to 30 seconds, more than enough for any tmpdir scan while still
/// failing a genuinely stuck test.
fn drain_to_terminal(handle: &ScanHandle) -> (Vec<ScanProgress>, ScanProgress) {
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut seen = Vec::new();
    loop {
        assert!(
            Instant::now() < deadline,
            "scanner did not finish within 30 seconds"
        );
        match handle.progress_rx.try_recv() {
            Ok(msg) if msg.is_terminal() => return (seen, msg),
            Ok(msg) => seen.push(msg),
            Err(crossbeam_channel::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                panic!("scanner channel disconnected before a terminal message");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// A snapshot sees every regular file below the root.
#[test]
fn snapshot_discovers_all_files() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let config = ScanConfig {
        exclude_patterns: Vec::new(),
        ..config_for(tmp.path())
    };
    let snapshot = Scanner::new(config)
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap();

    let root = fs::canonicalize(tmp.path()).unwrap();
    let app_log = snapshot
        .files()
        .values()
        .find(|f| f.path.ends_with("app/app.log"))
        .expect("app.log in snapshot");
    assert_eq!(app_log.size, 100);
    assert!(!app_log.is_dir);
    assert!(app_log.path.is_absolute());
    assert!(app_log.path.starts_with(&root) || app_log.path.starts_with(tmp.path()));

    let regular: u64 = snapshot
        .files()
        .values()
        .filter(|f| !f.is_dir)
        .map(|f| f.size)
        .sum();
    assert_eq!(regular, 1_050);
    assert_eq!(snapshot.file_count(), 5);
}

/// Excluding `*.gz` keeps every `.gz` path out of the snapshot.
#[test]
fn gz_exclusion_is_honoured() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let snapshot = Scanner::new(config_for(tmp.path()))
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap();

    assert!(!snapshot.is_empty());
    assert!(snapshot
        .files()
        .keys()
        .all(|p| !p.to_string_lossy().ends_with(".gz")));
}

#[test]
fn max_depth_limits_the_walk() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let shallow = ScanConfig {
        max_depth: 1,
        ..config_for(tmp.path())
    };
    let snapshot = Scanner::new(shallow)
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap();

    assert!(snapshot.files().keys().any(|p| p.ends_with("nginx/access.log")));
    assert!(!snapshot.files().keys().any(|p| p.ends_with("old.log")));
}

#[test]
fn missing_root_is_an_error() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let config = config_for(&tmp.path().join("does-not-exist"));
    let err = Scanner::new(config)
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, ScanError::RootInaccessible { .. }));
}

/// A file appended to between the two snapshots is reported with the exact
/// byte delta; untouched files are not.
#[test]
fn scan_reports_file_written_between_snapshots() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());
    let target = tmp.path().join("app/app.log");

    let config = ScanConfig {
        interval: Duration::from_millis(400),
        threshold_bytes: 4_096,
        ..config_for(tmp.path())
    };
    let scanner = Scanner::new(config).unwrap();
    let cancel = CancelToken::new();

    // Write while the scanner waits between its two snapshots.
    let result = scanner
        .scan_with_progress(&cancel, |msg| {
            if matches!(msg, ScanProgress::Waiting { .. }) {
                append_bytes(&target, 10_000);
            }
        })
        .unwrap();

    assert_eq!(result.growing_files.len(), 1);
    let growth = &result.growing_files[0];
    assert!(growth.path.ends_with("app/app.log"));
    assert_eq!(growth.initial_size, 100);
    assert_eq!(growth.final_size, 10_100);
    assert_eq!(growth.growth_bytes, 10_000);
    assert!(growth.growth_rate > 0.0);
    assert_eq!(result.total_growth, 10_000);
    assert!(result.end_time >= result.start_time);
    assert_eq!(result.paths, vec![tmp.path().to_path_buf()]);
}

/// A baseline persisted to disk can be compared with a fresh snapshot.
#[test]
fn saved_baseline_compares_against_fresh_snapshot() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let logs = tmp.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    write_bytes(&logs.join("svc.log"), 10);

    let scanner = Scanner::new(config_for(&logs)).unwrap();
    let cancel = CancelToken::new();
    let store = SnapshotStore::new(tmp.path().join("snapshots"));

    let baseline = scanner.take_snapshot(&cancel).unwrap();
    store.save(&baseline, "baseline.json").unwrap();

    append_bytes(&logs.join("svc.log"), 2_000);
    std::thread::sleep(Duration::from_millis(20));
    let fresh = scanner.take_snapshot(&cancel).unwrap();

    let loaded = store.load("baseline.json").unwrap();
    assert_eq!(loaded, baseline);
    let growth = analysis::diff(&loaded, &fresh, 1_000);
    assert_eq!(growth.len(), 1);
    assert_eq!(growth[0].growth_bytes, 2_000);
}

/// A file name that is not valid UTF-8 is snapshotted, saved and loaded
/// back unchanged.
#[test]
fn non_utf8_file_name_survives_the_store() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let logs = tmp.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    let odd = logs.join(OsStr::from_bytes(b"bad\xffname.log"));
    write_bytes(&odd, 12);
    write_bytes(&logs.join("ok.log"), 3);

    let snapshot = Scanner::new(config_for(&logs))
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap();
    assert_eq!(snapshot.file_count(), 2);

    let store = SnapshotStore::new(tmp.path().join("snapshots"));
    store.save(&snapshot, "odd.json").unwrap();
    let loaded = store.load("odd.json").unwrap();

    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.get(&odd).map(|f| f.size), Some(12));
}

/// The background scan streams both snapshots, the wait, then `Complete`.
#[test]
fn start_scan_streams_progress_then_result() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let handle = start_scan(config_for(tmp.path())).unwrap();
    let (seen, terminal) = drain_to_terminal(&handle);

    let snapshots: Vec<u8> = seen
        .iter()
        .filter_map(|m| match m {
            ScanProgress::SnapshotTaken { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(snapshots, vec![1, 2]);
    assert!(seen
        .iter()
        .any(|m| matches!(m, ScanProgress::Waiting { .. })));

    match terminal {
        ScanProgress::Complete(result) => {
            assert_eq!(result.snapshot1.file_count(), result.snapshot2.file_count());
            assert!(result.growing_files.is_empty());
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

/// Cancelling during the inter-snapshot wait ends the scan promptly with
/// `Cancelled`.
#[test]
fn cancellation_sends_cancelled_message() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let config = ScanConfig {
        interval: Duration::from_secs(60),
        ..config_for(tmp.path())
    };
    let started = Instant::now();
    let handle = start_scan(config).unwrap();

    // Wait for the first snapshot so the cancel lands in the wait.
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        assert!(Instant::now() < deadline, "first snapshot never arrived");
        if let Ok(ScanProgress::Waiting { .. }) =
            handle.progress_rx.recv_timeout(Duration::from_millis(100))
        {
            break;
        }
    }
    handle.cancel();
    assert!(handle.is_cancelled());

    let (_, terminal) = drain_to_terminal(&handle);
    assert!(matches!(terminal, ScanProgress::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(30));
    handle.join();
}

/// Dropping the handle mid-scan must not hang the process.
#[test]
fn dropping_handle_cancels_scan() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_test_tree(tmp.path());

    let config = ScanConfig {
        interval: Duration::from_secs(60),
        ..config_for(tmp.path())
    };
    let handle = start_scan(config).unwrap();
    let rx = handle.progress_rx.clone();
    drop(handle);

    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        assert!(Instant::now() < deadline, "scan kept running after drop");
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(ScanProgress::Cancelled) => break,
            Ok(ScanProgress::Complete(_)) => panic!("scan completed despite drop"),
            Ok(_) | Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// `PROGRESS_CHANNEL_CAPACITY` must be positive so `send()` never blocks on
/// an empty buffer.
const _: () = assert!(
    PROGRESS_CHANNEL_CAPACITY > 0,
    "PROGRESS_CHANNEL_CAPACITY must be > 0"
);

/// Many files across many directories are all collected by the pool.
#[test]
fn wide_tree_is_fully_collected() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    for d in 0..20 {
        let dir = tmp.path().join(format!("d{d:02}"));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..50 {
            write_bytes(&dir.join(format!("f{f:02}.log")), 10);
        }
    }

    let config = ScanConfig {
        worker_count: 8,
        ..config_for(tmp.path())
    };
    let snapshot = Scanner::new(config)
        .unwrap()
        .take_snapshot(&CancelToken::new())
        .unwrap();

    let files = snapshot.files().values().filter(|f| !f.is_dir).count();
    assert_eq!(files, 1_000);
    assert_eq!(
        snapshot.files().values().filter(|f| !f.is_dir).map(|f| f.size).sum::<u64>(),
        10_000
    );
}

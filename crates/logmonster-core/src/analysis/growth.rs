/// Growth analysis: diffs two snapshots into per-file growth records.
use crate::model::{FileGrowth, Snapshot};
use std::cmp::Ordering;
use std::time::Duration;

/// Interval substituted when the later snapshot is not strictly later.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Compute per-file growth from `earlier` to `later`.
///
/// Only non-directory entries of `later` are considered. A path missing from
/// `earlier` counts as growing from zero. Shrinking files and files deleted
/// between the snapshots are never reported. Entries with
/// `growth_bytes < threshold_bytes` are dropped.
///
/// The result is sorted by `growth_rate` descending, ties broken by path so
/// repeated runs over identical input yield identical order.
pub fn diff(earlier: &Snapshot, later: &Snapshot, threshold_bytes: u64) -> Vec<FileGrowth> {
    let interval = (later.timestamp() - earlier.timestamp())
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(MIN_INTERVAL);
    let secs = interval.as_secs_f64();

    let mut growing: Vec<FileGrowth> = later
        .files()
        .values()
        .filter(|info| !info.is_dir)
        .filter_map(|info| {
            let initial = earlier.get(&info.path).map(|prev| prev.size).unwrap_or(0);
            let growth = info.size.checked_sub(initial)?;
            if growth < threshold_bytes {
                return None;
            }
            Some(FileGrowth {
                path: info.path.clone(),
                initial_size: initial,
                final_size: info.size,
                growth_bytes: growth,
                growth_rate: growth as f64 / secs,
                interval,
            })
        })
        .collect();

    growing.sort_by(|a, b| {
        b.growth_rate
            .partial_cmp(&a.growth_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    growing
}

/// Sum of `growth_bytes` across `growth`.
pub fn total_growth(growth: &[FileGrowth]) -> u64 {
    growth.iter().map(|g| g.growth_bytes).sum()
}

/// Keep only entries growing at `min_rate` bytes/second or faster.
pub fn filter_by_rate(growth: &[FileGrowth], min_rate: f64) -> Vec<FileGrowth> {
    growth
        .iter()
        .filter(|g| g.growth_rate >= min_rate)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileInfo;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::path::Path;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn snap(at: DateTime<Utc>, files: &[(&str, u64)]) -> Snapshot {
        Snapshot::from_files(
            at,
            files.iter().map(|(p, s)| FileInfo::file(*p, *s, at)),
        )
    }

    /// The canonical runaway-log case: 10.5 MB written in 5 s.
    #[test]
    fn reports_growth_and_rate_over_interval() {
        let a = snap(t0(), &[("/var/log/app.log", 1_000_000)]);
        let b = snap(
            t0() + ChronoDuration::seconds(5),
            &[("/var/log/app.log", 11_500_000)],
        );

        let growth = diff(&a, &b, 10_485_760);
        assert_eq!(growth.len(), 1);
        let g = &growth[0];
        assert_eq!(g.path, Path::new("/var/log/app.log"));
        assert_eq!(g.initial_size, 1_000_000);
        assert_eq!(g.final_size, 11_500_000);
        assert_eq!(g.growth_bytes, 10_500_000);
        assert_eq!(g.growth_rate, 2_100_000.0);
        assert_eq!(g.interval, Duration::from_secs(5));
    }

    #[test]
    fn new_file_counts_from_zero() {
        let a = snap(t0(), &[]);
        let b = snap(t0() + ChronoDuration::seconds(2), &[("/tmp/new.log", 4_000)]);

        let growth = diff(&a, &b, 4_000);
        assert_eq!(growth.len(), 1);
        assert_eq!(growth[0].initial_size, 0);
        assert_eq!(growth[0].growth_bytes, 4_000);
        assert_eq!(growth[0].growth_rate, 2_000.0);

        assert!(diff(&a, &b, 4_001).is_empty());
    }

    #[test]
    fn identical_snapshots_report_nothing() {
        let a = snap(t0(), &[("/a", 10), ("/b", 20_000)]);
        assert!(diff(&a, &a, 1).is_empty());
    }

    #[test]
    fn truncation_and_deletion_are_not_reported() {
        let a = snap(t0(), &[("/shrunk", 500), ("/deleted", 900)]);
        let b = snap(t0() + ChronoDuration::seconds(1), &[("/shrunk", 100)]);
        assert!(diff(&a, &b, 0).is_empty());
    }

    #[test]
    fn directories_are_ignored() {
        let a = snap(t0(), &[]);
        let mut dir = FileInfo::file("/var/log/big", 50_000, t0());
        dir.is_dir = true;
        let b = Snapshot::from_files(t0() + ChronoDuration::seconds(1), vec![dir]);
        assert!(diff(&a, &b, 1).is_empty());
    }

    /// Zero or negative intervals fall back to exactly one second.
    #[test]
    fn non_positive_interval_uses_one_second() {
        let a = snap(t0(), &[("/f", 0)]);
        let same_time = snap(t0(), &[("/f", 3_000)]);
        let earlier_time = snap(t0() - ChronoDuration::seconds(10), &[("/f", 3_000)]);

        for later in [&same_time, &earlier_time] {
            let growth = diff(&a, later, 1);
            assert_eq!(growth.len(), 1);
            assert_eq!(growth[0].interval, MIN_INTERVAL);
            assert_eq!(growth[0].growth_rate, 3_000.0);
        }
    }

    #[test]
    fn output_sorted_by_rate_descending_with_stable_ties() {
        let a = snap(t0(), &[("/slow", 0), ("/fast", 0), ("/tie-b", 0), ("/tie-a", 0)]);
        let b = snap(
            t0() + ChronoDuration::seconds(1),
            &[("/slow", 10), ("/fast", 1_000), ("/tie-b", 500), ("/tie-a", 500)],
        );

        let growth = diff(&a, &b, 1);
        let order: Vec<_> = growth.iter().map(|g| g.path.to_string_lossy().into_owned()).collect();
        assert_eq!(order, vec!["/fast", "/tie-a", "/tie-b", "/slow"]);

        for pair in growth.windows(2) {
            assert!(pair[0].growth_rate >= pair[1].growth_rate);
        }
        assert_eq!(diff(&a, &b, 1), growth);
    }

    /// Every record respects the threshold and the size identity.
    #[test]
    fn every_record_respects_threshold_and_identity() {
        let files_a: Vec<(String, u64)> = (0..200u64).map(|i| (format!("/f{i}"), i * 37 % 1_000)).collect();
        let files_b: Vec<(String, u64)> = (0..250u64).map(|i| (format!("/f{i}"), i * 91 % 2_000)).collect();
        let a = Snapshot::from_files(t0(), files_a.iter().map(|(p, s)| FileInfo::file(p.as_str(), *s, t0())));
        let later = t0() + ChronoDuration::milliseconds(2_500);
        let b = Snapshot::from_files(later, files_b.iter().map(|(p, s)| FileInfo::file(p.as_str(), *s, later)));

        for threshold in [1u64, 100, 750, 1_999] {
            for g in diff(&a, &b, threshold) {
                assert!(g.growth_bytes >= threshold);
                assert_eq!(g.growth_bytes, g.final_size - g.initial_size);
            }
        }
    }

    #[test]
    fn totals_and_rate_filter() {
        let a = snap(t0(), &[]);
        let b = snap(t0() + ChronoDuration::seconds(1), &[("/x", 100), ("/y", 3_000_000)]);
        let growth = diff(&a, &b, 1);
        assert_eq!(total_growth(&growth), 3_000_100);
        let fast = filter_by_rate(&growth, 1_048_576.0);
        assert_eq!(fast.len(), 1);
        assert_eq!(fast[0].path, Path::new("/y"));
    }
}

/// Point-in-time file metadata captured by the snapshot engine.
///
/// A `Snapshot` is built once by the scanner's single aggregator and never
/// mutated afterwards, which is why its fields are read through accessors
/// rather than exposed directly.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::Metadata;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Metadata for one file, captured at a single instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Normalised absolute path.
    #[serde(with = "crate::model::os_path")]
    pub path: PathBuf,
    /// Logical size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
    /// Permission bits (`mode & 0o777`).
    pub permission: u32,
}

impl FileInfo {
    /// Build from already-fetched metadata.
    pub fn from_metadata(path: PathBuf, meta: &Metadata) -> Self {
        let mod_time = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH));
        Self {
            path,
            size: meta.len(),
            mod_time,
            is_dir: meta.is_dir(),
            permission: meta.permissions().mode() & 0o777,
        }
    }

    /// A regular file entry with default permissions. Mostly useful when
    /// constructing snapshots by hand (tests, imports).
    pub fn file(path: impl Into<PathBuf>, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            mod_time,
            is_dir: false,
            permission: 0o644,
        }
    }
}

/// A point-in-time record of file metadata across every scanned root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    timestamp: DateTime<Utc>,
    /// Persisted as a list of entries sorted by path; the map key is always
    /// the entry's own path.
    #[serde(with = "file_list")]
    files: HashMap<PathBuf, FileInfo>,
    total_size: u64,
    file_count: u64,
}

impl Snapshot {
    /// Build a snapshot from a set of entries.
    ///
    /// Later duplicates of the same path replace earlier ones, so the map
    /// keys stay unique. Totals count non-directory entries only.
    pub fn from_files(timestamp: DateTime<Utc>, files: impl IntoIterator<Item = FileInfo>) -> Self {
        let mut map: HashMap<PathBuf, FileInfo> = HashMap::new();
        for info in files {
            map.insert(info.path.clone(), info);
        }
        let (total_size, file_count) = map
            .values()
            .filter(|f| !f.is_dir)
            .fold((0u64, 0u64), |(size, count), f| (size + f.size, count + 1));
        Self {
            timestamp,
            files: map,
            total_size,
            file_count,
        }
    }

    /// When the walk that produced this snapshot started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn files(&self) -> &HashMap<PathBuf, FileInfo> {
        &self.files
    }

    pub fn get(&self, path: &Path) -> Option<&FileInfo> {
        self.files.get(path)
    }

    /// Sum of the sizes of all non-directory entries.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of non-directory entries.
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

mod file_list {
    use super::FileInfo;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;
    use std::path::PathBuf;

    pub fn serialize<S: Serializer>(
        files: &HashMap<PathBuf, FileInfo>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<&FileInfo> = files.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        serializer.collect_seq(entries)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<PathBuf, FileInfo>, D::Error> {
        let entries = Vec::<FileInfo>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|info| (info.path.clone(), info))
            .collect())
    }
}

//! Snapshot persistence.
//!
//! Snapshots are written as JSON and `load(save(s)) == s`, timestamps
//! included. File names that are not valid UTF-8 are stored as byte arrays
//! (see [`crate::model::os_path`]).

use crate::error::StoreError;
use crate::model::Snapshot;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes snapshots under a base directory.
///
/// Relative file names resolve against the base directory; absolute paths
/// are used as given.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.base_path.join(name)
        }
    }

    /// Write `snapshot` to `name`, creating the base directory if needed.
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so a crash never leaves a half-written snapshot behind.
    pub fn save(&self, snapshot: &Snapshot, name: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let target = self.resolve(name.as_ref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = target.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let written = write_json(&tmp, snapshot)
            .and_then(|()| fs::rename(&tmp, &target).map_err(StoreError::from));
        if let Err(err) = written {
            // Best effort: the temporary may never have been created.
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        debug!(
            "Saved snapshot ({} files) to {}",
            snapshot.file_count(),
            target.display()
        );
        Ok(target)
    }

    /// Read a snapshot previously written by [`save`](Self::save).
    pub fn load(&self, name: impl AsRef<Path>) -> Result<Snapshot, StoreError> {
        let source = self.resolve(name.as_ref());
        let reader = BufReader::new(fs::File::open(&source)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        debug!(
            "Loaded snapshot ({} files) from {}",
            snapshot.file_count(),
            source.display()
        );
        Ok(snapshot)
    }
}

fn write_json(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    Ok(())
}

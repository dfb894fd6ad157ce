//! JSON snapshot persistence for the behavior store.
//!
//! The whole store is one JSON document:
//!
//! ```json
//! { "<profile>": { "<behavior id>": { "id": "...", "baseSpeed": 2.5, ... } } }
//! ```
//!
//! It is read wholesale at startup and written wholesale on flush.
//! Writes go to `<file>.tmp` first and are renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact. Optionally the
//! previous snapshot is rotated into `<file>.bak.1 .. <file>.bak.N`.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{Result, StoreError};
use crate::profile::Profiles;

/// Handle to the snapshot file backing a store.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    backup_count: u32,
}

impl SnapshotFile {
    /// Snapshot at `path` with no backup rotation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_count: 0,
        }
    }

    /// Snapshot described by the `[persistence]` config section.
    #[must_use]
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self {
            path: config.data_file.clone(),
            backup_count: config.backup_count,
        }
    }

    /// Keep up to `count` rotated backups.
    #[must_use]
    pub fn with_backups(mut self, count: u32) -> Self {
        self.backup_count = count;
        self
    }

    /// Path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    /// Read and decode the snapshot.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, or
    /// [`StoreError::Serialization`] if it is not a valid snapshot.
    pub fn read(&self) -> Result<Option<Profiles>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut profiles: Profiles =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let rekeyed = profiles.normalize_keys();
        if rekeyed > 0 {
            warn!(
                path = %self.path.display(),
                rekeyed,
                "Snapshot entries keyed differently from their id were re-keyed"
            );
        }
        Ok(Some(profiles))
    }

    /// Load the snapshot, degrading to an empty store on any failure.
    ///
    /// A file that exists but cannot be decoded is renamed to
    /// `<file>.corrupt` so the next flush does not overwrite the only copy.
    #[must_use]
    pub fn load(&self) -> Profiles {
        let start = Instant::now();
        match self.read() {
            Ok(Some(profiles)) => {
                info!(
                    path = %self.path.display(),
                    profiles = profiles.len(),
                    behaviors = profiles.behavior_count(),
                    elapsed_us = start.elapsed().as_micros(),
                    "Loaded behavior snapshot"
                );
                profiles
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                Profiles::new()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot unreadable, starting with an empty store"
                );
                self.quarantine();
                Profiles::new()
            }
        }
    }

    fn quarantine(&self) {
        if !self.path.exists() {
            return;
        }
        let dest = self.sibling("corrupt");
        match fs::rename(&self.path, &dest) {
            Ok(()) => warn!(dest = %dest.display(), "Moved unreadable snapshot aside"),
            Err(e) => warn!(error = %e, "Could not move unreadable snapshot aside"),
        }
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Write `profiles` as the new snapshot. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if encoding fails or
    /// [`StoreError::Io`] if any filesystem step fails.
    pub fn save(&self, profiles: &Profiles) -> Result<usize> {
        let start = Instant::now();
        let json =
            serde_json::to_vec(profiles).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if self.backup_count > 0 && self.path.exists() {
            self.rotate_backups()?;
        }

        let tmp = self.sibling("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            profiles = profiles.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved behavior snapshot"
        );
        Ok(json.len())
    }

    /// Shift `.bak.1 .. .bak.(N-1)` up by one and copy the current snapshot
    /// into `.bak.1`. The oldest backup falls off the end.
    fn rotate_backups(&self) -> Result<()> {
        let max = self.backup_count;
        let oldest = self.backup_path(max);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        fs::copy(&self.path, self.backup_path(1))?;
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `behaviors.json.bak.1`).
    #[must_use]
    pub fn backup_path(&self, n: u32) -> PathBuf {
        self.sibling(&format!("bak.{n}"))
    }

    /// `<file>.<suffix>` next to the snapshot.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut p = self.path.clone();
        let ext = match p.extension() {
            Some(e) => format!("{}.{suffix}", e.to_string_lossy()),
            None => suffix.to_string(),
        };
        p.set_extension(ext);
        p
    }
}

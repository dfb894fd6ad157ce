//! The behavior store: profile-partitioned records behind one lock.
//!
//! [`BehaviorStore`] owns the [`Profiles`] map and is shared by handle
//! (`Arc<BehaviorStore>`) with every request handler. A single
//! `parking_lot::Mutex` guards both reads and writes; snapshot writes happen
//! under the same lock so the file always reflects one consistent state.
//!
//! Persistence is best-effort. A failed snapshot write is logged and counted
//! but never fails the operation that triggered it: the in-memory result is
//! authoritative.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{BehaviorStoreConfig, FlushMode};
use crate::error::{Result, StoreError, require};
use crate::metrics::{CounterSnapshot, StoreCounters};
use crate::persistence::SnapshotFile;
use crate::profile::{Profile, Profiles};
use crate::retention::{self, RetentionPolicy};
use crate::types::{Behavior, BehaviorData};

/// Mutable state guarded by the store lock.
#[derive(Debug, Default)]
struct StoreState {
    profiles: Profiles,
    dirty: bool,
    last_saved_at: Option<DateTime<Utc>>,
}

/// Point-in-time summary of the store, served by `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Number of profiles.
    pub profiles: usize,
    /// Behaviors across all profiles.
    pub behaviors: usize,
    /// Whether there are mutations not yet written to the snapshot.
    pub dirty: bool,
    /// When the snapshot was last written successfully.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Operation counters since startup.
    pub counters: CounterSnapshot,
}

/// Process-wide behavior store.
///
/// # Usage
///
/// ```
/// # use bhv_core::store::BehaviorStore;
/// # use bhv_core::retention::RetentionPolicy;
/// # use bhv_core::types::BehaviorData;
/// let store = BehaviorStore::in_memory(RetentionPolicy::default());
/// store.upload("demo", "b1", BehaviorData::default())?;
/// assert_eq!(store.get_count("demo"), 1);
/// # Ok::<(), bhv_core::error::StoreError>(())
/// ```
pub struct BehaviorStore {
    state: Mutex<StoreState>,
    snapshot: Option<SnapshotFile>,
    flush_mode: FlushMode,
    retention: RetentionPolicy,
    counters: StoreCounters,
}

impl std::fmt::Debug for BehaviorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorStore")
            .field("snapshot", &self.snapshot)
            .field("flush_mode", &self.flush_mode)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl BehaviorStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// A store with no backing file. Useful for tests.
    #[must_use]
    pub fn in_memory(retention: RetentionPolicy) -> Self {
        Self::from_parts(Profiles::new(), None, FlushMode::Immediate, retention)
    }

    /// Load the snapshot at `snapshot` (or start empty) and back the store with it.
    #[must_use]
    pub fn with_snapshot(
        snapshot: SnapshotFile,
        flush_mode: FlushMode,
        retention: RetentionPolicy,
    ) -> Self {
        let profiles = snapshot.load();
        Self::from_parts(profiles, Some(snapshot), flush_mode, retention)
    }

    /// Build the store described by `config`, loading its snapshot.
    #[must_use]
    pub fn open(config: &BehaviorStoreConfig) -> Self {
        Self::with_snapshot(
            SnapshotFile::from_config(&config.persistence),
            config.persistence.flush_mode,
            config.retention,
        )
    }

    fn from_parts(
        profiles: Profiles,
        snapshot: Option<SnapshotFile>,
        flush_mode: FlushMode,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState {
                profiles,
                ..StoreState::default()
            }),
            snapshot,
            flush_mode,
            retention,
            counters: StoreCounters::new(),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a behavior, replacing any record with the same id in `profile`.
    ///
    /// Creates the profile if it does not exist yet.
    ///
    /// # Errors
    /// [`StoreError::Validation`] if `profile` or `id` is empty.
    pub fn upload(&self, profile: &str, id: &str, data: BehaviorData) -> Result<String> {
        let profile = require("profile", profile)?;
        let id = require("id", id)?;

        let mut state = self.state.lock();
        if !state.profiles.contains(profile) {
            info!(profile, "Creating profile");
        }
        let replaced = state
            .profiles
            .get_or_create(profile)
            .insert(Behavior::new(id, data))
            .is_some();
        StoreCounters::bump(&self.counters.uploads);
        debug!(profile, id, replaced, "Uploaded behavior");

        self.after_write(&mut state);
        Ok(id.to_owned())
    }

    /// Replace an existing behavior wholesale. The retention counter restarts at 0.
    ///
    /// # Errors
    /// [`StoreError::Validation`] for empty arguments,
    /// [`StoreError::ProfileNotFound`] / [`StoreError::BehaviorNotFound`] if
    /// the target does not exist.
    pub fn update_behavior(&self, profile: &str, id: &str, data: BehaviorData) -> Result<String> {
        let profile = require("profile", profile)?;
        let id = require("id", id)?;

        let mut state = self.state.lock();
        let slot = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_owned()))?
            .get_mut(id)
            .ok_or_else(|| StoreError::BehaviorNotFound {
                profile: profile.to_owned(),
                id: id.to_owned(),
            })?;
        *slot = Behavior::new(id, data);
        StoreCounters::bump(&self.counters.updates);
        debug!(profile, id, "Updated behavior");

        self.after_write(&mut state);
        Ok(id.to_owned())
    }

    /// Run one retention sweep over `profile` and return the retired ids.
    ///
    /// # Errors
    /// [`StoreError::Validation`] if `profile` is empty,
    /// [`StoreError::ProfileNotFound`] if it does not exist.
    pub fn mark_used(&self, profile: &str, used_ids: &[String]) -> Result<Vec<String>> {
        let profile = require("profile", profile)?;

        let mut state = self.state.lock();
        let target = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_owned()))?;
        let outcome = retention::sweep(target, used_ids, self.retention);
        let remaining = target.len();

        StoreCounters::bump(&self.counters.sweeps);
        StoreCounters::add(&self.counters.behaviors_retired, outcome.deleted.len() as u64);
        info!(
            profile,
            used = outcome.reset,
            aged = outcome.aged,
            retired = outcome.deleted.len(),
            remaining,
            "Retention sweep"
        );

        self.after_write(&mut state);
        Ok(outcome.deleted)
    }

    /// Reset the retention counter of each listed behavior that exists.
    ///
    /// # Errors
    /// [`StoreError::Validation`] if `profile` is empty,
    /// [`StoreError::ProfileNotFound`] if it does not exist.
    pub fn reset_unused_generations(&self, profile: &str, ids: &[String]) -> Result<Vec<String>> {
        let profile = require("profile", profile)?;

        let mut state = self.state.lock();
        let target = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_owned()))?;
        let updated = retention::reset(target, ids);
        debug!(
            profile,
            requested = ids.len(),
            updated = updated.len(),
            "Reset unused generations"
        );

        self.after_write(&mut state);
        Ok(updated)
    }

    /// Deep-copy `source` into a new profile named `target`.
    ///
    /// # Errors
    /// [`StoreError::Validation`] for empty names,
    /// [`StoreError::ProfileNotFound`] if `source` is absent,
    /// [`StoreError::ProfileExists`] if `target` already exists.
    pub fn clone_profile(&self, source: &str, target: &str) -> Result<String> {
        let source = require("source", source)?;
        let target = require("target", target)?;

        let mut state = self.state.lock();
        let copy: Profile = state
            .profiles
            .get(source)
            .ok_or_else(|| StoreError::ProfileNotFound(source.to_owned()))?
            .clone();
        if state.profiles.contains(target) {
            return Err(StoreError::ProfileExists(target.to_owned()));
        }
        let copied = copy.len();
        state.profiles.insert(target, copy);
        StoreCounters::bump(&self.counters.clones);
        info!(source, target, behaviors = copied, "Cloned profile");

        self.after_write(&mut state);
        Ok(target.to_owned())
    }

    /// Remove a whole profile. Returns how many behaviors it held.
    ///
    /// # Errors
    /// [`StoreError::Validation`] if `profile` is empty,
    /// [`StoreError::ProfileNotFound`] if it does not exist.
    pub fn delete_profile(&self, profile: &str) -> Result<usize> {
        let profile = require("profile", profile)?;

        let mut state = self.state.lock();
        let removed = state
            .profiles
            .remove(profile)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_owned()))?;
        StoreCounters::bump(&self.counters.deletions);
        info!(profile, behaviors = removed.len(), "Deleted profile");

        self.after_write(&mut state);
        Ok(removed.len())
    }

    /// Remove a single behavior and return it.
    ///
    /// # Errors
    /// [`StoreError::Validation`] for empty arguments,
    /// [`StoreError::ProfileNotFound`] / [`StoreError::BehaviorNotFound`] if
    /// the target does not exist.
    pub fn delete_behavior(&self, profile: &str, id: &str) -> Result<Behavior> {
        let profile = require("profile", profile)?;
        let id = require("behavior_id", id)?;

        let mut state = self.state.lock();
        let removed = state
            .profiles
            .get_mut(profile)
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_owned()))?
            .remove(id)
            .ok_or_else(|| StoreError::BehaviorNotFound {
                profile: profile.to_owned(),
                id: id.to_owned(),
            })?;
        StoreCounters::bump(&self.counters.deletions);
        debug!(profile, id, "Deleted behavior");

        self.after_write(&mut state);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every behavior in `profile`, in insertion order. Empty if absent.
    ///
    /// # Errors
    /// [`StoreError::Validation`] if `profile` is empty.
    pub fn get_all(&self, profile: &str) -> Result<Vec<Behavior>> {
        let profile = require("profile", profile)?;
        let state = self.state.lock();
        Ok(state
            .profiles
            .get(profile)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// A single behavior, if present.
    #[must_use]
    pub fn get_behavior(&self, profile: &str, id: &str) -> Option<Behavior> {
        self.state
            .lock()
            .profiles
            .get(profile)
            .and_then(|p| p.get(id))
            .cloned()
    }

    /// Number of behaviors in `profile`; 0 if it does not exist.
    #[must_use]
    pub fn get_count(&self, profile: &str) -> usize {
        self.state.lock().profiles.get(profile).map_or(0, Profile::len)
    }

    /// All profile names in creation order.
    #[must_use]
    pub fn get_profiles(&self) -> Vec<String> {
        self.state.lock().profiles.names().map(str::to_owned).collect()
    }

    /// Summary counts and counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let state = self.state.lock();
        StoreStats {
            profiles: state.profiles.len(),
            behaviors: state.profiles.behavior_count(),
            dirty: state.dirty,
            last_saved_at: state.last_saved_at,
            counters: self.counters.snapshot(),
        }
    }

    /// Whether there are mutations not yet written to the snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Configured flush strategy.
    #[must_use]
    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// The backing snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the snapshot now if there are unsaved mutations.
    ///
    /// Returns `true` if a snapshot was written. Failures are logged and
    /// leave the store dirty so the next flush retries.
    pub fn flush(&self) -> bool {
        let mut state = self.state.lock();
        if !state.dirty {
            return false;
        }
        self.persist_locked(&mut state)
    }

    fn after_write(&self, state: &mut StoreState) {
        state.dirty = true;
        if self.flush_mode == FlushMode::Immediate {
            self.persist_locked(state);
        }
    }

    fn persist_locked(&self, state: &mut StoreState) -> bool {
        let Some(snapshot) = &self.snapshot else {
            return false;
        };
        match snapshot.save(&state.profiles) {
            Ok(_) => {
                state.dirty = false;
                state.last_saved_at = Some(Utc::now());
                StoreCounters::bump(&self.counters.saves_completed);
                true
            }
            Err(e) => {
                StoreCounters::bump(&self.counters.save_failures);
                error!(
                    path = %snapshot.path().display(),
                    error = %e,
                    "Snapshot write failed; keeping in-memory state"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> BehaviorStore {
        BehaviorStore::in_memory(RetentionPolicy::default())
    }

    fn speed(v: f64) -> BehaviorData {
        BehaviorData {
            base_speed: Some(json!(v)),
            ..BehaviorData::default()
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn upload_requires_profile_and_id() {
        let store = store();
        assert!(matches!(
            store.upload("", "b1", BehaviorData::default()),
            Err(StoreError::Validation("profile"))
        ));
        assert!(matches!(
            store.upload("demo", "", BehaviorData::default()),
            Err(StoreError::Validation("id"))
        ));
        assert!(store.get_profiles().is_empty());
    }

    #[test]
    fn upload_overwrites_without_merge() {
        let store = store();
        store
            .upload(
                "demo",
                "b1",
                BehaviorData {
                    turn_speed: Some(json!(1.0)),
                    ..speed(2.5)
                },
            )
            .expect("upload");
        store.upload("demo", "b1", speed(3.0)).expect("re-upload");

        let all = store.get_all("demo").expect("get_all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data.base_speed, Some(json!(3.0)));
        assert_eq!(all[0].data.turn_speed, None);
    }

    #[test]
    fn upload_resets_counter() {
        let store = store();
        store.upload("demo", "b1", speed(1.0)).expect("upload");
        store.mark_used("demo", &[]).expect("sweep");
        assert_eq!(store.get_behavior("demo", "b1").map(|b| b.unused_generations), Some(1));

        store.upload("demo", "b1", speed(1.0)).expect("re-upload");
        assert_eq!(store.get_behavior("demo", "b1").map(|b| b.unused_generations), Some(0));
    }

    #[test]
    fn ids_are_scoped_per_profile() {
        let store = store();
        store.upload("a", "same", speed(1.0)).expect("upload a");
        store.upload("b", "same", speed(2.0)).expect("upload b");

        assert_eq!(store.get_behavior("a", "same").and_then(|b| b.data.base_speed), Some(json!(1.0)));
        assert_eq!(store.get_behavior("b", "same").and_then(|b| b.data.base_speed), Some(json!(2.0)));
        store.delete_behavior("a", "same").expect("delete");
        assert!(store.get_behavior("b", "same").is_some());
    }

    #[test]
    fn update_requires_existing_target() {
        let store = store();
        assert!(matches!(
            store.update_behavior("demo", "b1", speed(1.0)),
            Err(StoreError::ProfileNotFound(_))
        ));
        store.upload("demo", "b1", speed(1.0)).expect("upload");
        assert!(matches!(
            store.update_behavior("demo", "b2", speed(1.0)),
            Err(StoreError::BehaviorNotFound { .. })
        ));

        store.update_behavior("demo", "b1", speed(4.0)).expect("update");
        assert_eq!(store.get_behavior("demo", "b1").and_then(|b| b.data.base_speed), Some(json!(4.0)));
        assert_eq!(store.get_count("demo"), 1);
    }

    #[test]
    fn absent_profiles_read_as_empty() {
        let store = store();
        assert!(store.get_all("nobody").expect("get_all").is_empty());
        assert_eq!(store.get_count("nobody"), 0);
        assert!(matches!(store.get_all(""), Err(StoreError::Validation("profile"))));
    }

    #[test]
    fn mark_used_on_absent_profile_fails() {
        let store = store();
        assert!(matches!(
            store.mark_used("nobody", &[]),
            Err(StoreError::ProfileNotFound(_))
        ));
        assert!(matches!(
            store.reset_unused_generations("nobody", &[]),
            Err(StoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn sweep_retires_after_limit() {
        let store = store();
        store.upload("demo", "used", speed(1.0)).expect("upload");
        store.upload("demo", "idle", speed(1.0)).expect("upload");

        for _ in 0..4 {
            assert!(store.mark_used("demo", &ids(&["used"])).expect("sweep").is_empty());
        }
        let deleted = store.mark_used("demo", &ids(&["used"])).expect("sweep");
        assert_eq!(deleted, ids(&["idle"]));
        assert_eq!(store.get_count("demo"), 1);
        // Emptied-by-sweep profiles keep existing.
        store.mark_used("demo", &[]).expect("sweep");
        assert!(store.get_profiles().contains(&"demo".to_string()));

        let stats = store.stats();
        assert_eq!(stats.counters.sweeps, 6);
        assert_eq!(stats.counters.behaviors_retired, 1);
    }

    #[test]
    fn clone_is_independent() {
        let store = store();
        for id in ["x", "y", "z"] {
            store.upload("A", id, speed(1.0)).expect("upload");
        }
        assert_eq!(store.clone_profile("A", "B").expect("clone"), "B");
        assert_eq!(store.get_count("B"), 3);

        store.update_behavior("B", "x", speed(9.0)).expect("update clone");
        store.mark_used("B", &[]).expect("sweep clone");

        let original = store.get_behavior("A", "x").expect("source record");
        assert_eq!(original.data.base_speed, Some(json!(1.0)));
        assert_eq!(original.unused_generations, 0);
    }

    #[test]
    fn clone_errors() {
        let store = store();
        assert!(matches!(
            store.clone_profile("missing", "B"),
            Err(StoreError::ProfileNotFound(_))
        ));
        store.upload("A", "x", speed(1.0)).expect("upload");
        store.upload("B", "y", speed(1.0)).expect("upload");
        assert!(matches!(
            store.clone_profile("A", "B"),
            Err(StoreError::ProfileExists(_))
        ));
        assert!(matches!(
            store.clone_profile("A", ""),
            Err(StoreError::Validation("target"))
        ));
        assert_eq!(store.get_count("B"), 1);
    }

    #[test]
    fn deletes_on_absent_targets_leave_store_untouched() {
        let store = store();
        store.upload("demo", "b1", speed(1.0)).expect("upload");

        assert!(store.delete_profile("ghost").expect_err("absent").is_not_found());
        assert!(store.delete_behavior("ghost", "b1").expect_err("absent").is_not_found());
        assert!(store.delete_behavior("demo", "ghost").expect_err("absent").is_not_found());

        assert_eq!(store.get_profiles(), ids(&["demo"]));
        assert_eq!(store.get_count("demo"), 1);
        assert_eq!(store.stats().counters.deletions, 0);
    }

    #[test]
    fn delete_profile_removes_partition() {
        let store = store();
        store.upload("demo", "b1", speed(1.0)).expect("upload");
        store.upload("demo", "b2", speed(1.0)).expect("upload");
        assert_eq!(store.delete_profile("demo").expect("delete"), 2);
        assert!(store.get_profiles().is_empty());
        assert!(store.get_all("demo").expect("get_all").is_empty());
    }

    #[test]
    fn immediate_mode_writes_every_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("behaviors.json");
        let store = BehaviorStore::with_snapshot(
            SnapshotFile::new(&path),
            FlushMode::Immediate,
            RetentionPolicy::default(),
        );

        store.upload("demo", "b1", speed(2.5)).expect("upload");
        assert!(!store.is_dirty());
        let on_disk = SnapshotFile::new(&path).read().expect("read").expect("Some");
        assert_eq!(on_disk.behavior_count(), 1);
        assert_eq!(store.stats().counters.saves_completed, 1);
    }

    #[test]
    fn periodic_mode_defers_until_flush() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("behaviors.json");
        let store = BehaviorStore::with_snapshot(
            SnapshotFile::new(&path),
            FlushMode::Periodic,
            RetentionPolicy::default(),
        );

        store.upload("demo", "b1", speed(2.5)).expect("upload");
        assert!(store.is_dirty());
        assert!(!path.exists());

        assert!(store.flush());
        assert!(!store.is_dirty());
        assert!(path.exists());
        assert!(!store.flush(), "clean store has nothing to write");
    }

    #[test]
    fn failed_write_keeps_result_and_stays_dirty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("behaviors.json");
        let store = BehaviorStore::with_snapshot(
            SnapshotFile::new(&path),
            FlushMode::Immediate,
            RetentionPolicy::default(),
        );
        // A directory where the snapshot file should be makes the rename fail.
        std::fs::create_dir(&path).expect("mkdir");

        assert_eq!(store.upload("demo", "b1", speed(1.0)).expect("upload"), "b1");
        assert_eq!(store.get_count("demo"), 1);
        assert!(store.is_dirty());
        assert_eq!(store.stats().counters.save_failures, 1);
    }
}

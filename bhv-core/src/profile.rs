//! Profile partitions and the profile map.
//!
//! A [`Profile`] maps behavior ids to [`Behavior`]s; [`Profiles`] maps
//! profile names to profiles. Both preserve insertion order, which is the
//! order `get_all` and `get_profiles` report and the order the snapshot file
//! is written in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::Behavior;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// One named partition of behavior records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile {
    behaviors: IndexMap<String, Behavior>,
}

impl Profile {
    /// Create an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace a behavior, keyed by its id.
    ///
    /// A replaced record keeps its original position.
    pub fn insert(&mut self, behavior: Behavior) -> Option<Behavior> {
        self.behaviors.insert(behavior.id.clone(), behavior)
    }

    /// Look up a behavior by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Behavior> {
        self.behaviors.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Behavior> {
        self.behaviors.get_mut(id)
    }

    /// Whether a behavior with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.behaviors.contains_key(id)
    }

    /// Remove a behavior, keeping the order of the remaining ones.
    pub fn remove(&mut self, id: &str) -> Option<Behavior> {
        self.behaviors.shift_remove(id)
    }

    /// Keep only the behaviors for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Behavior) -> bool) {
        self.behaviors.retain(|_, behavior| keep(behavior));
    }

    /// Number of behaviors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Whether the profile holds no behaviors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Behaviors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Behavior> {
        self.behaviors.values()
    }

    /// Mutable iteration in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Behavior> {
        self.behaviors.values_mut()
    }
}

impl FromIterator<Behavior> for Profile {
    fn from_iter<I: IntoIterator<Item = Behavior>>(iter: I) -> Self {
        let mut profile = Self::new();
        for behavior in iter {
            profile.insert(behavior);
        }
        profile
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// All profiles, keyed by name. This is exactly what the snapshot file holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profiles {
    profiles: IndexMap<String, Profile>,
}

impl Profiles {
    /// Create an empty profile map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a profile.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Profile> {
        self.profiles.get_mut(name)
    }

    /// Return the named profile, creating it empty if absent.
    pub fn get_or_create(&mut self, name: &str) -> &mut Profile {
        self.profiles.entry(name.to_owned()).or_default()
    }

    /// Whether the named profile exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Insert a whole profile under `name`, replacing any existing one.
    pub fn insert(&mut self, name: impl Into<String>, profile: Profile) -> Option<Profile> {
        self.profiles.insert(name.into(), profile)
    }

    /// Remove a profile, keeping the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        self.profiles.shift_remove(name)
    }

    /// Profile names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether there are no profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Total behaviors across every profile.
    #[must_use]
    pub fn behavior_count(&self) -> usize {
        self.profiles.values().map(Profile::len).sum()
    }

    /// Re-key every behavior by its own `id`.
    ///
    /// A hand-edited snapshot can carry a map key that disagrees with the
    /// record's `id`; the record wins. Returns how many entries were re-keyed.
    pub fn normalize_keys(&mut self) -> usize {
        let mut fixed = 0;
        for profile in self.profiles.values_mut() {
            let mismatched = profile
                .behaviors
                .iter()
                .filter(|(key, behavior)| **key != behavior.id)
                .count();
            if mismatched > 0 {
                let behaviors = std::mem::take(&mut profile.behaviors);
                *profile = behaviors.into_values().collect();
                fixed += mismatched;
            }
        }
        fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BehaviorData;

    fn behavior(id: &str) -> Behavior {
        Behavior::new(id, BehaviorData::default())
    }

    #[test]
    fn replace_keeps_position() {
        let mut profile: Profile = ["a", "b", "c"].into_iter().map(behavior).collect();

        let mut replacement = behavior("b");
        replacement.data.base_speed = Some(serde_json::json!(9.0));
        let old = profile.insert(replacement);

        assert!(old.is_some());
        let ids: Vec<_> = profile.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(
            profile.get("b").and_then(|b| b.data.base_speed.clone()),
            Some(serde_json::json!(9.0))
        );
    }

    #[test]
    fn remove_preserves_order() {
        let mut profile: Profile = ["a", "b", "c"].into_iter().map(behavior).collect();
        assert!(profile.remove("a").is_some());
        assert!(profile.remove("a").is_none());
        let ids: Vec<_> = profile.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn profile_map_counts_and_order() {
        let mut profiles = Profiles::new();
        profiles.get_or_create("zeta").insert(behavior("1"));
        profiles.get_or_create("alpha").insert(behavior("1"));
        profiles.get_or_create("alpha").insert(behavior("2"));

        assert_eq!(profiles.names().collect::<Vec<_>>(), ["zeta", "alpha"]);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles.behavior_count(), 3);
    }

    #[test]
    fn normalize_rekeys_mismatched_entries() {
        let mut profiles: Profiles = serde_json::from_value(serde_json::json!({
            "demo": {
                "stale": {"id": "fresh"},
                "ok": {"id": "ok"}
            }
        }))
        .expect("deserialize");

        assert_eq!(profiles.normalize_keys(), 1);
        let demo = profiles.get("demo").expect("profile");
        assert!(demo.contains("fresh"));
        assert!(!demo.contains("stale"));
        assert!(demo.contains("ok"));
        assert_eq!(profiles.normalize_keys(), 0);
    }

    #[test]
    fn serializes_as_nested_object() {
        let mut profiles = Profiles::new();
        profiles.get_or_create("demo").insert(behavior("b1"));

        let value = serde_json::to_value(&profiles).expect("serialize");
        assert_eq!(value["demo"]["b1"]["id"], "b1");
        assert_eq!(value["demo"]["b1"]["unusedGenerations"], 0);
    }
}

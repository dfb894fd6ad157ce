//! Usage-based retention for behaviors.
//!
//! After every simulated generation the client reports which behaviors it
//! actually used. Reported behaviors have their `unusedGenerations` counter
//! reset; every other behavior in the profile ages by one. A behavior whose
//! counter reaches the generation limit is retired in that same sweep.
//!
//! ```text
//!  used ──▶ counter = 0
//!  not used ──▶ counter += 1 ──▶ counter >= limit ──▶ removed
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Sweeps a behavior may go unused before it is retired.
pub const DEFAULT_GENERATION_LIMIT: u32 = 5;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Retention thresholds, loaded from the `[retention]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Counter value at which a behavior is deleted.
    #[serde(default = "default_generation_limit")]
    pub generation_limit: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            generation_limit: DEFAULT_GENERATION_LIMIT,
        }
    }
}

fn default_generation_limit() -> u32 {
    DEFAULT_GENERATION_LIMIT
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// What a single [`sweep`] did to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Ids removed because they reached the limit, in profile order.
    pub deleted: Vec<String>,
    /// Behaviors whose counter was reset because they were used.
    pub reset: usize,
    /// Behaviors whose counter was incremented.
    pub aged: usize,
}

/// Apply one generation of usage to `profile`.
///
/// Ids in `used_ids` that do not exist in the profile are ignored.
pub fn sweep(profile: &mut Profile, used_ids: &[String], policy: RetentionPolicy) -> SweepOutcome {
    let used: HashSet<&str> = used_ids.iter().map(String::as_str).collect();
    let mut outcome = SweepOutcome::default();

    for behavior in profile.iter_mut() {
        if used.contains(behavior.id.as_str()) {
            behavior.unused_generations = 0;
            outcome.reset += 1;
        } else {
            behavior.unused_generations = behavior.unused_generations.saturating_add(1);
            outcome.aged += 1;
        }
    }

    outcome.deleted = profile
        .iter()
        .filter(|b| b.is_expired(policy.generation_limit))
        .map(|b| b.id.clone())
        .collect();
    if !outcome.deleted.is_empty() {
        profile.retain(|b| !b.is_expired(policy.generation_limit));
    }

    outcome
}

/// Reset the counter of every listed behavior that exists in `profile`.
///
/// Returns the ids actually found, in request order without duplicates.
/// Unknown ids are skipped silently.
pub fn reset(profile: &mut Profile, ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut updated = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        if let Some(behavior) = profile.get_mut(id) {
            behavior.unused_generations = 0;
            updated.push(id.clone());
        }
    }
    updated
}

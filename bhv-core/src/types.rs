//! Core record types for the behavior store.
//!
//! The tuning fields are opaque to the store: whatever JSON value a client
//! sends under a known key is persisted and returned as-is (an integer stays
//! an integer, a string stays a string). Only `unusedGenerations` is owned by
//! the store (see [`crate::retention`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Tuning payload
// ---------------------------------------------------------------------------

/// The caller-supplied part of a behavior record.
///
/// Every field is optional; absent fields are stored and served as `null`.
/// Unknown keys in an incoming document are dropped. Values are never
/// inspected, so the key set is fixed but the value types are not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorData {
    /// Inner detection radius.
    pub small_detection_radius: Option<Value>,
    /// Outer detection radius.
    pub large_detection_radius: Option<Value>,
    /// Radius at which the agent stops completely.
    pub full_stop_radius: Option<Value>,
    /// Detection cone angle.
    pub detection_angle: Option<Value>,
    /// Cruising speed.
    pub base_speed: Option<Value>,
    /// Speed after the player has been encountered.
    pub player_encountered_speed: Option<Value>,
    /// How long the agent stays stopped.
    pub stop_duration: Option<Value>,
    /// Turn applied after a stop.
    pub turn_after_stop_angle: Option<Value>,
    /// Lower bound of the random turn range.
    pub random_turn_lower_bound: Option<Value>,
    /// Upper bound of the random turn range.
    pub random_turn_upper_bound: Option<Value>,
    /// Global randomness factor.
    pub randomness_factor: Option<Value>,
    /// Base turn angle.
    pub base_turn_angle: Option<Value>,
    /// Randomness applied to the base turn angle.
    pub turn_angle_randomness: Option<Value>,
    /// Turn speed.
    pub turn_speed: Option<Value>,
    /// Caller-managed generation number.
    pub generation: Option<Value>,
    /// Caller-managed priority.
    pub prio: Option<Value>,
}

// ---------------------------------------------------------------------------
// Behavior record
// ---------------------------------------------------------------------------

/// A stored behavior: id, tuning payload and the retention counter.
///
/// Serialises flat, e.g.
/// `{"id":"b1","smallDetectionRadius":null,...,"baseSpeed":2.5,...,"unusedGenerations":0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    /// Identifier, unique within its profile.
    pub id: String,
    /// Caller-supplied tuning fields.
    #[serde(flatten)]
    pub data: BehaviorData,
    /// Consecutive sweeps this behavior was not reported as used.
    #[serde(default)]
    pub unused_generations: u32,
}

impl Behavior {
    /// Create a fresh record with its retention counter at zero.
    #[must_use]
    pub fn new(id: impl Into<String>, data: BehaviorData) -> Self {
        Self {
            id: id.into(),
            data,
            unused_generations: 0,
        }
    }

    /// Whether this behavior has gone unused for at least `limit` sweeps.
    #[must_use]
    pub fn is_expired(&self, limit: u32) -> bool {
        self.unused_generations >= limit
    }
}

//! Fixtures shared by the behavior store benchmarks.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

use bhv_core::profile::Profile;
use bhv_core::types::{Behavior, BehaviorData};
use serde_json::json;

/// Tuning record whose values vary with `i`.
#[must_use]
pub fn make_data(i: u32) -> BehaviorData {
    let f = f64::from(i);
    BehaviorData {
        small_detection_radius: Some(json!(2.0 + f / 100.0)),
        large_detection_radius: Some(json!(8.0 + f / 50.0)),
        base_speed: Some(json!(1.0 + f / 1000.0)),
        turn_speed: Some(json!(0.5)),
        generation: Some(json!(i / 20)),
        ..BehaviorData::default()
    }
}

/// Profile of `n` behaviors with ids `b0 .. b{n-1}`.
#[must_use]
pub fn make_profile(n: u32) -> Profile {
    (0..n)
        .map(|i| Behavior::new(format!("b{i}"), make_data(i)))
        .collect()
}

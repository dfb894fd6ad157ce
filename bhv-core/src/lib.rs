//! # bhv-core
//!
//! Profile-partitioned storage for agent behavior records, with a
//! usage-based retention policy.
//!
//! A [`BehaviorStore`] holds named **profiles**; each profile maps behavior
//! ids to [`Behavior`] tuning records. Clients report which behaviors a
//! simulation generation actually used, and behaviors left unused for
//! [`retention::DEFAULT_GENERATION_LIMIT`] consecutive generations are retired.
//!
//! ```text
//! BehaviorStore ─┬─ "initial" ─┬─ "b1" → Behavior { baseSpeed, ..., unusedGenerations }
//!                │             └─ "b2" → Behavior { ... }
//!                └─ "demo"    ─── "b1" → Behavior { ... }
//! ```
//!
//! The whole store is persisted as a single JSON snapshot
//! (see [`persistence`]), written after each mutation or periodically.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod profile;
pub mod retention;
pub mod store;
pub mod types;

pub use config::BehaviorStoreConfig;
pub use error::StoreError;
pub use store::BehaviorStore;
pub use types::{Behavior, BehaviorData};

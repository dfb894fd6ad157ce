//! Periodic snapshot flushing.
//!
//! In `periodic` flush mode mutations only mark the store dirty. This task
//! writes the snapshot on a fixed interval when there is something to write.
//! The final flush on shutdown is done by `main`, not here.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::routes::SharedStore;

/// Spawn the autosave loop. Abort the handle to stop it.
pub fn spawn(store: SharedStore, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Autosave enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to save yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.flush()).await {
                Ok(true) => debug!("Autosaved snapshot"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Autosave task failed"),
            }
        }
    })
}

//! `bhv-server` entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bhv_core::BehaviorStore;
use bhv_core::config::FlushMode;
use bhv_server::{autosave, cli::Cli, shutdown, telemetry};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;
    telemetry::init(&config.general).context("initialising logging")?;

    info!(
        data_file = %config.persistence.data_file.display(),
        flush_mode = ?config.persistence.flush_mode,
        generation_limit = config.retention.generation_limit,
        "Starting behavior store"
    );

    let store = Arc::new(BehaviorStore::open(&config));

    let autosave = (config.persistence.flush_mode == FlushMode::Periodic).then(|| {
        autosave::spawn(
            Arc::clone(&store),
            Duration::from_secs(config.persistence.auto_save_interval_seconds),
        )
    });

    let app = bhv_server::app(Arc::clone(&store), &config.server);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    if let Some(handle) = autosave {
        handle.abort();
    }
    let flush_store = Arc::clone(&store);
    let written = tokio::task::spawn_blocking(move || flush_store.flush()).await?;

    let stats = store.stats();
    info!(
        final_flush = written,
        dirty = stats.dirty,
        profiles = stats.profiles,
        behaviors = stats.behaviors,
        counters = ?stats.counters,
        "Shutdown complete"
    );
    Ok(())
}

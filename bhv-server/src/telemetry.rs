//! Logging setup.

use bhv_core::config::{GeneralConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `general.log_level` when set.
///
/// # Errors
/// Returns an error if the level string is invalid or a subscriber is
/// already installed.
pub fn init(general: &GeneralConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&general.log_level)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match general.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}

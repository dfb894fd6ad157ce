//! Command-line interface.

use std::path::PathBuf;

use bhv_core::config::BehaviorStoreConfig;
use bhv_core::error::Result;
use clap::Parser;

/// Behavior store HTTP server.
#[derive(Debug, Default, Parser)]
#[command(name = "bhv-server", version, about)]
pub struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "BHV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overriding `server.bind`.
    #[arg(long, env = "BHV_BIND")]
    pub bind: Option<String>,

    /// Snapshot file, overriding `persistence.data_file`.
    #[arg(long, env = "BHV_DATA_FILE")]
    pub data_file: Option<PathBuf>,
}

impl Cli {
    /// Read the config file (if any) and apply command-line overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the result is invalid.
    pub fn load_config(&self) -> Result<BehaviorStoreConfig> {
        let mut config = match &self.config {
            Some(path) => BehaviorStoreConfig::from_file(path)?,
            None => BehaviorStoreConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.server.bind.clone_from(bind);
        }
        if let Some(data_file) = &self.data_file {
            config.persistence.data_file.clone_from(data_file);
        }
        config.validate()?;
        Ok(config)
    }
}

//! Configuration for the behavior store service.
//!
//! Maps directly to `behaviors.toml`. Every key is optional; an empty file
//! yields the defaults below.
//!
//! ```toml
//! [general]
//! log_level = "info"
//! log_format = "pretty"
//!
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [persistence]
//! data_file = "behaviors.json"
//! flush_mode = "immediate"
//!
//! [retention]
//! generation_limit = 5
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::retention::RetentionPolicy;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorStoreConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Snapshot file and flush behaviour.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Retention sweep thresholds.
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl BehaviorStoreConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if the TOML is invalid or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject settings that would make the service misbehave.
    ///
    /// # Errors
    /// Returns `StoreError::Config` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.retention.generation_limit == 0 {
            return Err(StoreError::Config(
                "retention.generation_limit must be at least 1".into(),
            ));
        }
        if self.persistence.flush_mode == FlushMode::Periodic
            && self.persistence.auto_save_interval_seconds == 0
        {
            return Err(StoreError::Config(
                "persistence.auto_save_interval_seconds must be non-zero in periodic mode".into(),
            ));
        }
        if self.persistence.data_file.as_os_str().is_empty() {
            return Err(StoreError::Config("persistence.data_file must not be empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, one event per line.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_permissive: true,
        }
    }
}

/// When mutations reach the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Write the snapshot after every successful mutation.
    #[default]
    Immediate,
    /// Mark dirty; a background task and shutdown write it.
    Periodic,
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the JSON snapshot.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Flush strategy.
    #[serde(default)]
    pub flush_mode: FlushMode,
    /// Auto-save interval in seconds (periodic mode).
    #[serde(default = "default_30")]
    pub auto_save_interval_seconds: u64,
    /// Number of previous snapshots to keep as `.bak.N` files; 0 disables.
    #[serde(default)]
    pub backup_count: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            flush_mode: FlushMode::Immediate,
            auto_save_interval_seconds: 30,
            backup_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_bind() -> String { "0.0.0.0:5000".to_string() }
fn default_data_file() -> PathBuf { PathBuf::from("behaviors.json") }
fn default_30() -> u64 { 30 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = BehaviorStoreConfig::from_toml("").expect("parse");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert!(config.server.cors_permissive);
        assert_eq!(config.persistence.data_file, PathBuf::from("behaviors.json"));
        assert_eq!(config.persistence.flush_mode, FlushMode::Immediate);
        assert_eq!(config.retention.generation_limit, 5);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BehaviorStoreConfig::from_toml(
            r#"
            [general]
            log_format = "json"

            [persistence]
            flush_mode = "periodic"
            auto_save_interval_seconds = 10
            backup_count = 2

            [retention]
            generation_limit = 3
            "#,
        )
        .expect("parse");

        assert_eq!(config.general.log_format, LogFormat::Json);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.persistence.flush_mode, FlushMode::Periodic);
        assert_eq!(config.persistence.auto_save_interval_seconds, 10);
        assert_eq!(config.persistence.backup_count, 2);
        assert_eq!(config.retention.generation_limit, 3);
    }

    #[test]
    fn zero_generation_limit_is_rejected() {
        let err = BehaviorStoreConfig::from_toml("[retention]\ngeneration_limit = 0\n")
            .expect_err("must fail");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn periodic_mode_needs_an_interval() {
        let err = BehaviorStoreConfig::from_toml(
            "[persistence]\nflush_mode = \"periodic\"\nauto_save_interval_seconds = 0\n",
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("auto_save_interval_seconds"));
    }

    #[test]
    fn unknown_flush_mode_is_a_config_error() {
        let err = BehaviorStoreConfig::from_toml("[persistence]\nflush_mode = \"sometimes\"\n")
            .expect_err("must fail");
        assert!(matches!(err, StoreError::Config(_)));
    }
}

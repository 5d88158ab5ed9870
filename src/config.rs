/*!
 * Configuration
 *
 * `EngineConfig` is the library's entire configuration surface: whatever
 * embeds UCXSync is responsible for argument parsing, CLI plumbing, and
 * loading this struct from TOML (or constructing it directly). Credential
 * fields for the mount provider are deliberately not modeled here — they
 * belong to that external collaborator's own configuration.
 */

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, UcxError};

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub base_mount: PathBuf,
    pub nodes: Vec<String>,
    pub shares: Vec<String>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_parallelism: usize,
    #[serde(with = "seconds", rename = "service_loop_interval_secs")]
    pub service_loop_interval: Duration,
    pub min_free_disk_space: u64,
    pub disk_space_safety_margin: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            service_loop_interval: Duration::from_secs(10),
            min_free_disk_space: 0,
            disk_space_safety_margin: 0,
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| UcxError::Config(e.to_string()))
    }

    /// Validate cross-field invariants that `serde` alone can't express.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(UcxError::Config("at least one node must be configured".to_string()));
        }
        if self.shares.is_empty() {
            return Err(UcxError::Config("at least one share must be configured".to_string()));
        }
        if self.sync.max_parallelism == 0 {
            return Err(UcxError::Config("sync.max_parallelism must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let toml = r#"
            base_mount = "/mnt"
            nodes = ["WU01", "WU02", "CU"]
            shares = ["E$", "F$"]
        "#;

        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.base_mount, PathBuf::from("/mnt"));
        assert_eq!(config.nodes, vec!["WU01", "WU02", "CU"]);
        assert_eq!(config.sync.max_parallelism, 8);
        assert_eq!(config.sync.service_loop_interval, Duration::from_secs(10));
    }

    #[test]
    fn parses_explicit_sync_overrides() {
        let toml = r#"
            base_mount = "/mnt"
            nodes = ["WU01"]
            shares = ["E$"]

            [sync]
            max_parallelism = 4
            service_loop_interval_secs = 30
            min_free_disk_space = 1000
            disk_space_safety_margin = 100
        "#;

        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.sync.max_parallelism, 4);
        assert_eq!(config.sync.service_loop_interval, Duration::from_secs(30));
        assert_eq!(config.sync.min_free_disk_space, 1000);
    }

    fn base_config() -> EngineConfig {
        EngineConfig {
            base_mount: PathBuf::from("/mnt"),
            nodes: vec!["WU01".to_string()],
            shares: vec!["E$".to_string()],
            sync: SyncConfig::default(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }

    #[test]
    fn rejects_empty_node_list() {
        let mut config = base_config();
        config.nodes = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let mut config = base_config();
        config.sync.max_parallelism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let result = EngineConfig::from_toml_str("not valid toml {{{");
        assert!(matches!(result, Err(UcxError::Config(_))));
    }
}

//! Configuration loading with hierarchical merging.
//!
//! Precedence (lowest to highest): compiled-in defaults, the project's
//! `.hive-mind/config.json` written by `init`, then `HIVE_*` environment
//! variables. Configuration is always project-local so multiple hives can
//! coexist on one machine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;
pub const HIVE_DIR: &str = ".hive-mind";
pub const SWARM_DIR: &str = ".swarm";
pub const CONFIG_FILE: &str = "config.json";
pub const HIVE_DB_FILE: &str = "hive.db";
pub const SWARM_DB_FILE: &str = "memory.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_agents: {0}. Must be between 1 and 100")]
    InvalidMaxAgents(u32),

    #[error("Invalid max_concurrent_hooks: {0}. Must be at least 1")]
    InvalidMaxConcurrentHooks(usize),

    #[error("Invalid max_concurrent_tasks: {0}. Must be at least 1")]
    InvalidMaxConcurrentTasks(usize),

    #[error("Data directory cannot be empty")]
    EmptyDataDir,
}

/// Feature toggles recorded in `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub auto_scale: bool,
    pub encryption: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            auto_scale: false,
            encryption: false,
        }
    }
}

/// Hivemind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    /// Schema version of the config file.
    pub schema_version: u32,
    /// RFC 3339 creation timestamp, written by `init`.
    pub created_at: Option<String>,
    /// Working directory root holding `.hive-mind/` and `.swarm/`.
    pub data_dir: String,
    /// Default worker cap for new swarms.
    pub max_agents: u32,
    /// Concurrent-hook cap for the coordinator.
    pub max_concurrent_hooks: usize,
    /// Running-task cap for the orchestrator.
    pub max_concurrent_tasks: usize,
    pub features: FeatureToggles,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: None,
            data_dir: ".".to_string(),
            max_agents: 8,
            max_concurrent_hooks: 3,
            max_concurrent_tasks: 10,
            features: FeatureToggles::default(),
        }
    }
}

impl HiveConfig {
    pub fn hive_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(HIVE_DIR)
    }

    pub fn swarm_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(SWARM_DIR)
    }

    pub fn hive_db_path(&self) -> PathBuf {
        self.hive_dir().join(HIVE_DB_FILE)
    }

    pub fn swarm_db_path(&self) -> PathBuf {
        self.swarm_dir().join(SWARM_DB_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.hive_dir().join(CONFIG_FILE)
    }
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from defaults, `.hive-mind/config.json`, and `HIVE_*`
    /// environment variables (`HIVE_MAX_AGENTS`, `HIVE_MAX_CONCURRENT_HOOKS`,
    /// `HIVE_DATA_DIR`).
    pub fn load() -> Result<HiveConfig> {
        // HIVE_DATA_DIR decides where the config file lives, so read it
        // ahead of the merged extraction.
        let data_dir =
            std::env::var("HIVE_DATA_DIR").unwrap_or_else(|_| ".".to_string());
        let config_path = Path::new(&data_dir).join(HIVE_DIR).join(CONFIG_FILE);

        let config: HiveConfig = Figment::new()
            .merge(Serialized::defaults(HiveConfig::default()))
            .merge(Json::file(config_path))
            .merge(Env::prefixed("HIVE_"))
            .extract()
            .context("Failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &HiveConfig) -> Result<(), ConfigError> {
        if config.max_agents == 0 || config.max_agents > 100 {
            return Err(ConfigError::InvalidMaxAgents(config.max_agents));
        }
        if config.max_concurrent_hooks == 0 {
            return Err(ConfigError::InvalidMaxConcurrentHooks(
                config.max_concurrent_hooks,
            ));
        }
        if config.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidMaxConcurrentTasks(
                config.max_concurrent_tasks,
            ));
        }
        if config.data_dir.is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        Ok(())
    }

    /// Write the config file, stamping schema version and creation time.
    pub fn write(config: &HiveConfig) -> Result<()> {
        let mut on_disk = config.clone();
        on_disk.schema_version = SCHEMA_VERSION;
        if on_disk.created_at.is_none() {
            on_disk.created_at = Some(chrono::Utc::now().to_rfc3339());
        }
        let path = config.config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&on_disk)?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = HiveConfig::default();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert_eq!(config.max_agents, 8);
    }

    #[test]
    fn test_validate_rejects_zero_agents() {
        let config = HiveConfig {
            max_agents: 0,
            ..HiveConfig::default()
        };
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("HIVE_MAX_AGENTS", Some("42")),
                ("HIVE_MAX_CONCURRENT_HOOKS", Some("7")),
                ("HIVE_DATA_DIR", Some("/tmp/hive-test")),
            ],
            || {
                let config = ConfigLoader::load().unwrap();
                assert_eq!(config.max_agents, 42);
                assert_eq!(config.max_concurrent_hooks, 7);
                assert_eq!(config.data_dir, "/tmp/hive-test");
            },
        );
    }

    #[test]
    fn test_paths_follow_data_dir() {
        let config = HiveConfig {
            data_dir: "/srv/hive".to_string(),
            ..HiveConfig::default()
        };
        assert_eq!(
            config.hive_db_path(),
            PathBuf::from("/srv/hive/.hive-mind/hive.db")
        );
        assert_eq!(
            config.swarm_db_path(),
            PathBuf::from("/srv/hive/.swarm/memory.db")
        );
    }
}

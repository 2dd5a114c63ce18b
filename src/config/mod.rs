// ABOUTME: Configuration types and parsing for shipyard.yml.
// ABOUTME: Handles YAML parsing, discovery, env var interpolation, and sanity checks.

mod deserialize;
mod env_value;
mod host;
mod init;

pub use env_value::EnvValue;
pub use host::HostConfig;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::rollout::driver::DEFAULT_CANARY_SIZE;
use crate::types::HostId;
use crate::unit::UserInfo;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "shipyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipyard/config.yml";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://shipyard.db";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub rollout: RolloutConfig,

    /// Owner of host directories created before a container starts.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,

    #[serde(default, deserialize_with = "deserialize::deserialize_hosts")]
    pub hosts: Vec<HostConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: EnvValue,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> EnvValue {
    EnvValue::FromEnv {
        var: "SHIPYARD_DATABASE_URL".to_string(),
        default: Some(DEFAULT_DATABASE_URL.to_string()),
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolloutConfig {
    #[serde(default = "default_canary_size")]
    pub canary_size: usize,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            canary_size: default_canary_size(),
        }
    }
}

fn default_canary_size() -> usize {
    DEFAULT_CANARY_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BootstrapConfig {
    pub uid: u32,
    pub gid: u32,
}

impl From<BootstrapConfig> for UserInfo {
    fn from(config: BootstrapConfig) -> Self {
        UserInfo {
            uid: config.uid,
            gid: config.gid,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.rollout.canary_size == 0 {
            return Err(Error::InvalidConfig(
                "rollout.canary_size must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            let id = host.host_id();
            if !seen.insert(id.clone()) {
                return Err(Error::InvalidConfig(format!("duplicate host id: {id}")));
            }
        }
        Ok(())
    }

    /// Resolved database URL.
    pub fn database_url(&self) -> Result<String> {
        self.database.url.resolve()
    }

    pub fn host_ids(&self) -> Vec<HostId> {
        self.hosts.iter().map(HostConfig::host_id).collect()
    }

    pub fn bootstrap_owner(&self) -> Option<UserInfo> {
        self.bootstrap.map(UserInfo::from)
    }
}

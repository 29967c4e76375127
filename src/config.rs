//! YAML configuration for the control plane.

use crate::control_plane::DeploySettings;
use crate::fault::{ExitPolicy, ShutdownMode};
use crate::monitor::DEFAULT_REPOSITORY_CAPACITY;
use crate::observability::DEFAULT_LOG_FILTER;
use crate::timeouts::DEFAULT_COMMIT_ATTEMPTS;
use crate::topology::params::{DEFAULT_CLEANUP_RETRY_DELAY_MS, DEFAULT_NEW_NODE_RETRY_TIME_MS};
use crate::topology::Policies;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub monitor: MonitorConfig,
    pub deploy: DeployConfig,
    pub fault: FaultConfig,
    pub logging: LoggingConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub repository_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            repository_capacity: DEFAULT_REPOSITORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub new_node_retry_time_ms: u64,
    pub cleanup_retry_delay_ms: u64,
    pub commit_attempts: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            new_node_retry_time_ms: DEFAULT_NEW_NODE_RETRY_TIME_MS,
            cleanup_retry_delay_ms: DEFAULT_CLEANUP_RETRY_DELAY_MS,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub default_exit_policy: ExitPolicy,
    pub shutdown_mode: ShutdownMode,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            default_exit_policy: ExitPolicy::Restart,
            shutdown_mode: ShutdownMode::Process,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Topology document to load at startup; relative to the config file.
    pub document_path: Option<PathBuf>,
}

impl ControlPlaneConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: ControlPlaneConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.repository_capacity == 0 {
            return Err(ConfigError::Invalid(
                "monitor.repository_capacity must be greater than zero".into(),
            ));
        }
        if self.deploy.commit_attempts == 0 {
            return Err(ConfigError::Invalid(
                "deploy.commit_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Global policies seeded from the deploy section.
    pub fn policies(&self) -> Policies {
        Policies {
            new_node_retry_time_ms: self.deploy.new_node_retry_time_ms,
            cleanup_retry_delay_ms: self.deploy.cleanup_retry_delay_ms,
            ..Policies::default()
        }
    }

    pub fn deploy_settings(&self) -> DeploySettings {
        DeploySettings::from_policies(&self.policies(), self.deploy.commit_attempts)
    }
}

pub fn load_config(path: &Path) -> Result<ControlPlaneConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = ControlPlaneConfig::from_yaml(&raw)?;
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if let Some(document) = config.metadata.document_path.as_mut() {
        if document.is_relative() {
            *document = base.join(&*document);
        }
    }
    Ok(config)
}

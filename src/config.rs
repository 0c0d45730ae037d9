// Configuration management

use crate::error::{FleetmuxError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single managed host and its SSH credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub hostname: String,
    pub username: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

impl HostConfig {
    /// A host must carry exactly one credential: password or key file
    pub fn validate(&self) -> Result<()> {
        match (&self.password, &self.ssh_key_path) {
            (None, None) => Err(FleetmuxError::Config(format!(
                "host '{}' configured with neither password nor ssh key",
                self.hostname
            ))
            .into()),
            (Some(_), Some(_)) => Err(FleetmuxError::Config(format!(
                "host '{}' configured with both password and ssh key; pick one",
                self.hostname
            ))
            .into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_host: String,
    pub listen_port: u16,
    /// Seconds between fleet polls; absent or `null` means poll once
    /// and stop
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    pub hosts: Vec<HostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9001,
            poll_interval_secs: Some(10),
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Get default config path: ~/.config/fleetmux/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("fleetmux").join("config.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Self::default_path().unwrap_or_default());

        let config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str::<Config>(&contents)?
        } else {
            // Return defaults if no config file exists
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to path
    pub fn save(&self, path: PathBuf) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate every configured host
    pub fn validate(&self) -> Result<()> {
        for host in &self.hosts {
            host.validate()?;
        }
        Ok(())
    }
}

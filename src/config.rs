//! Persisted service configuration.
//!
//! The descriptor lives as `service_config.json` next to the executable.
//! Every field carries a default so a partially filled file still loads;
//! a missing file is replaced with the full default descriptor.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::lifecycle::ServiceDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_description")]
    pub service_description: String,
    // Restart policy applied at install time
    #[serde(default = "default_restart_on_failure")]
    pub restart_on_failure: bool,
    /// Base restart delay in seconds; the recovery plan escalates from it.
    #[serde(default = "default_restart_delay")]
    pub restart_delay: u64,
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
    // Paths, resolved against the executable directory when relative
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_monitoring_path")]
    pub monitoring_path: Vec<PathBuf>,
    #[serde(default = "default_custom_data_path")]
    pub custom_data_path: PathBuf,
}

fn default_service_name() -> String {
    "iomond".to_string()
}

fn default_service_description() -> String {
    "iomond file-activity monitoring service".to_string()
}

fn default_restart_on_failure() -> bool {
    true
}

fn default_restart_delay() -> u64 {
    5
}

fn default_max_restart_attempts() -> u32 {
    3
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./db.sqlite")
}

fn default_monitoring_path() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn default_custom_data_path() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_description: default_service_description(),
            restart_on_failure: default_restart_on_failure(),
            restart_delay: default_restart_delay(),
            max_restart_attempts: default_max_restart_attempts(),
            log_path: default_log_path(),
            database_path: default_database_path(),
            monitoring_path: default_monitoring_path(),
            custom_data_path: default_custom_data_path(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config '{}'", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory '{}'", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write config to '{}'", path.display()))
    }

    /// Writes the default descriptor when none exists, then loads whatever
    /// is on disk.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default().save(path)?;
            info!("default configuration written to {}", path.display());
        }
        Self::load(path)
    }

    /// The immutable descriptor handed to lifecycle operations.
    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            name: self.service_name.clone(),
            description: self.service_description.clone(),
            restart_on_failure: self.restart_on_failure,
            restart_delay_secs: self.restart_delay,
            max_restart_attempts: self.max_restart_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_full_config() {
        let raw = r#"{
            "service_name": "svc1",
            "service_description": "test service",
            "restart_on_failure": false,
            "restart_delay": 7,
            "max_restart_attempts": 2,
            "log_path": "/var/log/svc1",
            "database_path": "/var/lib/svc1/db.sqlite",
            "monitoring_path": ["/opt", "/srv"],
            "custom_data_path": "/var/lib/svc1/data"
        }"#;

        let config: ServiceConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.service_name, "svc1");
        assert!(!config.restart_on_failure);
        assert_eq!(config.restart_delay, 7);
        assert_eq!(config.monitoring_path.len(), 2);
        assert_eq!(config.log_path, PathBuf::from("/var/log/svc1"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.service_name, "iomond");
        assert!(config.restart_on_failure);
        assert_eq!(config.restart_delay, 5);
        assert_eq!(config.max_restart_attempts, 3);
        assert_eq!(config.log_path, PathBuf::from("./logs"));
    }

    #[test]
    fn load_or_create_writes_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service_config.json");
        assert!(!path.exists());

        let config = ServiceConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.service_name, "iomond");

        // A second load picks up the persisted file rather than rewriting it.
        let reloaded = ServiceConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded.service_name, config.service_name);
    }

    #[test]
    fn descriptor_carries_restart_policy() {
        let config = ServiceConfig {
            restart_delay: 9,
            restart_on_failure: true,
            ..ServiceConfig::default()
        };
        let descriptor = config.descriptor();
        assert_eq!(descriptor.restart_delay_secs, 9);
        assert!(descriptor.restart_on_failure);
        assert_eq!(descriptor.name, "iomond");
    }
}

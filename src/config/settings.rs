use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_connect_timeout() -> u64 {
    30
}

fn default_test_timeout() -> u64 {
    15
}

fn default_command_timeout() -> u64 {
    120
}

fn default_remote_config_path() -> String {
    "$HOME/.kube/config".to_string()
}

/// Manager settings, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Connect-phase timeout for regular cluster connections, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Connect-phase timeout for test-before-save flows, in seconds.
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,
    /// Per-command execution timeout, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Where the kubeconfig lands on the bastion host.
    #[serde(default = "default_remote_config_path")]
    pub remote_config_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            test_timeout_secs: default_test_timeout(),
            command_timeout_secs: default_command_timeout(),
            remote_config_path: default_remote_config_path(),
        }
    }
}

impl Settings {
    /// Load from file, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Save to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_contract() {
        let settings = Settings::default();
        assert_eq!(settings.connect_timeout(), Duration::from_secs(30));
        assert_eq!(settings.test_timeout(), Duration::from_secs(15));
        assert_eq!(settings.command_timeout(), Duration::from_secs(120));
        assert_eq!(settings.remote_config_path, "$HOME/.kube/config");
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.connect_timeout_secs, 30);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusterlink.toml");

        let mut settings = Settings::default();
        settings.connect_timeout_secs = 5;
        settings.remote_config_path = "/opt/kube/config".to_string();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.connect_timeout_secs, 5);
        assert_eq!(loaded.remote_config_path, "/opt/kube/config");
        // Unset fields come back as defaults
        assert_eq!(loaded.test_timeout_secs, 15);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusterlink.toml");
        std::fs::write(&path, "connect_timeout_secs = 7\n").unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.connect_timeout_secs, 7);
        assert_eq!(loaded.command_timeout_secs, 120);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusterlink.toml");
        std::fs::write(&path, "connect_timeout_secs = \"not a number\"\n").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}

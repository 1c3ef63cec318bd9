//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/deskbridge/agent.toml`
//! - Windows: `%APPDATA%/deskbridge/agent.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use deskbridge_agent_server::{RouterOptions, ServerConfig};
use deskbridge_file_ops::{DEFAULT_MAX_DOWNLOAD_BYTES, expand_path};
use deskbridge_protocol::constants::DEFAULT_PORT;
use deskbridge_transfer::{DEFAULT_MAX_TRANSFER_BYTES, RegistryLimits};
use serde::{Deserialize, Serialize};

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Where completed uploads are written. `~` is expanded.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,

    /// Reject privileged requests until the device has paired.
    #[serde(default)]
    pub require_pairing: bool,

    /// Idle seconds before an unfinished upload is discarded.
    #[serde(default = "default_transfer_ttl")]
    pub transfer_ttl_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Cap on buffered bytes per upload.
    #[serde(default = "default_max_transfer_bytes")]
    pub max_transfer_bytes: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Largest file served by `file_download_request`.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_downloads_dir() -> String {
    "~/Downloads/deskbridge".into()
}

fn default_transfer_ttl() -> u64 {
    900
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_transfer_bytes() -> u64 {
    DEFAULT_MAX_TRANSFER_BYTES
}

fn default_command_timeout() -> u64 {
    30
}

fn default_max_download_bytes() -> u64 {
    DEFAULT_MAX_DOWNLOAD_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            downloads_dir: default_downloads_dir(),
            require_pairing: false,
            transfer_ttl_secs: default_transfer_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_transfer_bytes: default_max_transfer_bytes(),
            command_timeout_secs: default_command_timeout(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn downloads_path(&self) -> PathBuf {
        expand_path(&self.downloads_dir)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            transfer_ttl: Duration::from_secs(self.transfer_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            ..ServerConfig::default()
        }
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            require_pairing: self.require_pairing,
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            max_download_bytes: self.max_download_bytes,
        }
    }

    pub fn registry_limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_transfer_bytes: self.max_transfer_bytes,
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("deskbridge")
            .join("agent.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("deskbridge").join("agent.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/deskbridge/agent.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.downloads_dir, "~/Downloads/deskbridge");
        assert!(!config.require_pairing);
        assert_eq!(config.transfer_ttl_secs, 900);
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.max_download_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str("port = 9100\nrequire_pairing = true").unwrap();
        assert_eq!(config.port, 9100);
        assert!(config.require_pairing);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.max_transfer_bytes, DEFAULT_MAX_TRANSFER_BYTES);
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("deskbridge"));
    }

    #[test]
    fn load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("agent.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.toml");
        let config = Config {
            port: 9444,
            downloads_dir: "/srv/inbox".into(),
            command_timeout_secs: 5,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.downloads_path(), PathBuf::from("/srv/inbox"));
    }

    #[test]
    fn derived_settings() {
        let config = Config {
            sweep_interval_secs: 0,
            require_pairing: true,
            ..Config::default()
        };
        assert_eq!(config.server_config().sweep_interval, Duration::from_secs(1));
        assert_eq!(config.server_config().port, 9000);
        assert!(config.router_options().require_pairing);
        assert_eq!(config.router_options().command_timeout, Duration::from_secs(30));
        assert_eq!(config.registry_limits().max_transfer_bytes, DEFAULT_MAX_TRANSFER_BYTES);
    }
}

//! Client configuration file.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/parley/client.toml` (default `~/.config/parley/client.toml`)
//! - Windows: `%APPDATA%/parley/client.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use parley_connection::ClientConfig;

/// Environment variable overriding `connection.server_url`.
pub const SERVER_URL_ENV: &str = "PARLEY_SERVER_URL";

/// Contents of `client.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Access token. `--token` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Local user id. `--user-id` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Acknowledge every incoming message with `message_delivered`.
    pub auto_ack: bool,

    pub connection: ClientConfig,
}

impl AppConfig {
    /// Loads configuration from `path`, writing a default file if none exists.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig =
                toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // May contain the access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies server URL overrides. The flag wins over the environment,
    /// which wins over the file. Empty values are ignored.
    pub fn apply_server_overrides(&mut self, from_env: Option<String>, from_flag: Option<String>) {
        if let Some(url) = from_flag.or(from_env).filter(|u| !u.trim().is_empty()) {
            self.connection.server_url = url;
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var_os("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("parley").join("client.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var_os("HOME")
                    .context("neither XDG_CONFIG_HOME nor HOME is set")?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("parley").join("client.toml"))
    }
}

//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/backupstore/cdn3.toml`
//! - Windows: `%APPDATA%/backupstore/cdn3.toml`
//!
//! ```toml
//! default_limit = 100
//!
//! [storage_manager]
//! base_uri = "https://storage-manager.example"
//! client_id = "..."
//! client_secret = "..."
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use backupstore_remote_storage::Cdn3Config;
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// cdn3 storage manager connection.
    pub storage_manager: Cdn3Config,

    /// Page size for `list` when `--limit` is not given.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
}

fn default_limit() -> u64 {
    100
}

impl Config {
    /// Loads configuration from `path`, or from the platform path if `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing configuration in {}", path.display()))?;
        config.storage_manager.validate()?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("backupstore").join("cdn3.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("backupstore")
            .join("cdn3.toml"))
    }
}

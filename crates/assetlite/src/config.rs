//! Configuration management for assetlite.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::permission::access::{default_home_pages, default_role_grants};
use crate::permission::{default_mapping_entries, HomePage, MappingEntry, PermissionMappings, RoleGrant};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "assetlite";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "assetlite.db";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "ASSETLITE_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ASSETLITE_`, `__` between levels)
/// 2. TOML config file at `~/.config/assetlite/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Public site settings.
    pub site: SiteConfig,
    /// Access policy and permission mappings.
    pub permissions: PermissionsConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/assetlite/assetlite.db`
    pub database_path: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_address: String,
    /// Request header carrying the session user.
    pub user_header: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

/// Public site settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL used in QR deep links.
    pub url: String,
    /// Language used when a request names none.
    pub default_language: String,
}

/// Access policy and permission mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Entity type, category and field rows.
    pub mappings: Vec<MappingEntry>,
    /// Role grants.
    pub roles: Vec<RoleGrant>,
    /// Role to workspace route.
    pub home_pages: Vec<HomePage>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            user_header: "X-Assetlite-User".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            default_language: "ar".to_string(),
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            mappings: default_mapping_entries(),
            roles: default_role_grants(),
            home_pages: default_home_pages(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.user_header.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "user_header must not be empty".to_string(),
            });
        }
        if axum::http::HeaderName::from_bytes(self.server.user_header.as_bytes()).is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid user_header: {}", self.server.user_header),
            });
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "shutdown_timeout_secs must be greater than 0".to_string(),
            });
        }

        if !(self.site.url.starts_with("http://") || self.site.url.starts_with("https://")) {
            return Err(Error::ConfigValidation {
                message: format!("site url must start with http:// or https://: {}", self.site.url),
            });
        }

        PermissionMappings::from_entries(&self.permissions.mappings)?;
        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the shutdown grace period as a Duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream transit API settings
    #[serde(default)]
    pub transit: TransitConfig,

    /// Discussion platform settings
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Diff and publish fan-out settings
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.transit.regions_uri.trim().is_empty() {
            return Err(AppError::validation("transit.regions_uri is empty"));
        }
        if self.transit.user_agent.trim().is_empty() {
            return Err(AppError::validation("transit.user_agent is empty"));
        }
        if self.transit.timeout_secs == 0 {
            return Err(AppError::validation("transit.timeout_secs must be > 0"));
        }
        if self.transit.max_concurrent == 0 {
            return Err(AppError::validation("transit.max_concurrent must be > 0"));
        }
        if self.platform.base_uri.trim().is_empty() {
            return Err(AppError::validation("platform.base_uri is empty"));
        }
        if self.sync.max_concurrent_partitions == 0 {
            return Err(AppError::validation(
                "sync.max_concurrent_partitions must be > 0",
            ));
        }
        Ok(())
    }
}

/// Upstream transit API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitConfig {
    /// URI of the regions catalog listing
    #[serde(default = "defaults::regions_uri")]
    pub regions_uri: String,

    /// API key sent with every upstream request
    #[serde(default)]
    pub api_key: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            regions_uri: defaults::regions_uri(),
            api_key: String::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Discussion platform client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URI of the platform API
    #[serde(default = "defaults::base_uri")]
    pub base_uri: String,

    /// Application key for platform requests
    #[serde(default)]
    pub app_key: String,

    /// User handle that owns the published topics
    #[serde(default = "defaults::user_handle")]
    pub user_handle: String,

    /// Language tag attached to published topics
    #[serde(default = "defaults::topic_language")]
    pub topic_language: String,

    /// Prefix prepended to a topic title when its entity disappears upstream
    #[serde(default = "defaults::deleted_title_prefix")]
    pub deleted_title_prefix: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_uri: defaults::base_uri(),
            app_key: String::new(),
            user_handle: defaults::user_handle(),
            topic_language: defaults::topic_language(),
            deleted_title_prefix: defaults::deleted_title_prefix(),
        }
    }
}

/// Diff and publish fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum partitions diffed or published concurrently
    #[serde(default = "defaults::max_concurrent_partitions")]
    pub max_concurrent_partitions: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_partitions: defaults::max_concurrent_partitions(),
        }
    }
}

mod defaults {
    // Transit defaults
    pub fn regions_uri() -> String {
        "https://regions.onebusaway.org/regions-v3.json".into()
    }
    pub fn user_agent() -> String {
        "transit-sync/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        5
    }

    // Platform defaults
    pub fn base_uri() -> String {
        "https://social.example.org/v0.7".into()
    }
    pub fn user_handle() -> String {
        "transit-sync".into()
    }
    pub fn topic_language() -> String {
        "en-US".into()
    }
    pub fn deleted_title_prefix() -> String {
        "DELETED: ".into()
    }

    // Sync defaults
    pub fn max_concurrent_partitions() -> usize {
        8
    }
}

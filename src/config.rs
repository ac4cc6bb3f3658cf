use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::Resource;
use crate::constants::{
    API_BASE_URL_ENV, DEFAULT_API_BASE_URL, DEFAULT_MAX_RETRIES, DETAIL_CACHE_CAPACITY,
    DETAIL_CACHE_TTL_SECS, FRESHNESS_WINDOW_SECS, HISTORY_PAGE_SIZE, HTTP_TIMEOUT_SECS,
    NARROW_VISIBLE_PAGES, RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS, STORIES_PAGE_SIZE,
    USERS_PAGE_SIZE, WIDE_VISIBLE_PAGES,
};
use crate::pagination::Viewport;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a list page is served without a background refetch
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    /// Fetch the next page ahead of time
    #[serde(default = "default_true")]
    pub prefetch: bool,
    #[serde(default = "default_detail_ttl_secs")]
    pub detail_ttl_secs: u64,
    #[serde(default = "default_detail_capacity")]
    pub detail_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
            prefetch: true,
            detail_ttl_secs: default_detail_ttl_secs(),
            detail_capacity: default_detail_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_users_page_size")]
    pub users_page_size: u32,
    #[serde(default = "default_stories_page_size")]
    pub stories_page_size: u32,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    /// Page links shown on narrow viewports
    #[serde(default = "default_narrow_visible")]
    pub narrow_visible: u32,
    /// Page links shown on wide viewports
    #[serde(default = "default_wide_visible")]
    pub wide_visible: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            users_page_size: default_users_page_size(),
            stories_page_size: default_stories_page_size(),
            history_page_size: default_history_page_size(),
            narrow_visible: default_narrow_visible(),
            wide_visible: default_wide_visible(),
        }
    }
}

impl PaginationConfig {
    pub fn page_size(&self, resource: &Resource) -> u32 {
        let size = match resource {
            Resource::Users => self.users_page_size,
            Resource::Stories => self.stories_page_size,
            Resource::UserHistory { .. } => self.history_page_size,
        };
        size.max(1)
    }

    pub fn max_visible(&self, viewport: Viewport) -> u32 {
        match viewport {
            Viewport::Narrow => self.narrow_visible,
            Viewport::Wide => self.wide_visible,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt (transport failures only)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub viewport: Viewport,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("arkiv/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_freshness_secs() -> u64 {
    FRESHNESS_WINDOW_SECS
}

fn default_detail_ttl_secs() -> u64 {
    DETAIL_CACHE_TTL_SECS
}

fn default_detail_capacity() -> u64 {
    DETAIL_CACHE_CAPACITY
}

fn default_users_page_size() -> u32 {
    USERS_PAGE_SIZE
}

fn default_stories_page_size() -> u32 {
    STORIES_PAGE_SIZE
}

fn default_history_page_size() -> u32 {
    HISTORY_PAGE_SIZE
}

fn default_narrow_visible() -> u32 {
    NARROW_VISIBLE_PAGES
}

fn default_wide_visible() -> u32 {
    WIDE_VISIBLE_PAGES
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    RETRY_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    RETRY_MAX_DELAY_MS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("arkiv");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("arkiv");
        Ok(dir)
    }

    /// Load the config file. A missing file is created with the defaults so
    /// there is something to edit. The API base URL can be overridden from
    /// the environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        if !path.exists()
            && let Err(e) = config.save_to(&path)
        {
            tracing::warn!("Could not write default config: {:#}", e);
        }
        if let Ok(base_url) = std::env::var(API_BASE_URL_ENV)
            && !base_url.trim().is_empty()
        {
            tracing::debug!("API base URL overridden by {}", API_BASE_URL_ENV);
            config.api.base_url = base_url.trim().to_string();
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        fs::create_dir_all(Self::data_dir()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.cache.freshness(), Duration::from_secs(300));
        assert!(config.cache.prefetch);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.ui.viewport, Viewport::Wide);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [api]
            base_url = "https://mirror.example"

            [pagination]
            stories_page_size = 9
            narrow_visible = 4

            [ui]
            viewport = "narrow"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://mirror.example");
        assert_eq!(config.api.timeout_secs, HTTP_TIMEOUT_SECS);
        assert_eq!(config.pagination.page_size(&Resource::Stories), 9);
        assert_eq!(config.pagination.page_size(&Resource::Users), 12);
        assert_eq!(
            config
                .pagination
                .page_size(&Resource::UserHistory { uuid: "x".into() }),
            10
        );
        assert_eq!(config.pagination.max_visible(config.ui.viewport), 4);
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let config: Config = toml::from_str("[pagination]\nusers_page_size = 0\n").unwrap();
        assert_eq!(config.pagination.page_size(&Resource::Users), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.cache.prefetch = false;
        config.retry.max_retries = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.cache.prefetch);
        assert_eq!(loaded.retry.max_retries, 5);
        assert_eq!(loaded.retry.to_retry_config().max_retries, 5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache\nfreshness_secs = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

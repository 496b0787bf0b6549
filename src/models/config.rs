// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Polling loop settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Article store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Media archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Sitemaps and feeds to poll
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
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
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.harvest.interval_secs == 0 {
            return Err(AppError::validation("harvest.interval_secs must be > 0"));
        }
        for feed in &self.feeds {
            url::Url::parse(&feed.url).map_err(|e| {
                AppError::validation(format!("feed url {:?} is invalid: {}", feed.url, e))
            })?;
            if feed.outlet.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "feed {} has an empty outlet",
                    feed.url
                )));
            }
        }
        if self.archive.enabled && !matches!(self.archive.backend.as_str(), "local" | "s3") {
            return Err(AppError::validation(format!(
                "archive.backend {:?} is not one of \"local\", \"s3\"",
                self.archive.backend
            )));
        }
        Ok(())
    }

    /// Feeds to poll, optionally restricted to one outlet.
    pub fn feeds_for(&self, outlet: Option<&str>) -> Vec<FeedSource> {
        self.feeds
            .iter()
            .filter(|f| outlet.is_none_or(|o| f.outlet == o))
            .cloned()
            .collect()
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests, also the robots.txt token
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request deadline in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each completed request in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Consult robots.txt before fetching
    #[serde(default = "defaults::respect_robots")]
    pub respect_robots: bool,

    /// Maximum accepted response body size
    #[serde(default = "defaults::max_bytes")]
    pub max_bytes: u64,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            respect_robots: defaults::respect_robots(),
            max_bytes: defaults::max_bytes(),
        }
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Sleep between cycles in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl HarvestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

/// Article store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_root")]
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::storage_root(),
        }
    }
}

/// Media archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,

    /// "local" or "s3"
    #[serde(default = "defaults::archive_backend")]
    pub backend: String,

    /// Root directory for the local backend
    #[serde(default = "defaults::archive_root")]
    pub root_dir: PathBuf,

    /// Prefix of the references handed back to records
    #[serde(default = "defaults::public_url")]
    pub public_url: String,

    #[serde(default = "defaults::bucket")]
    pub bucket: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: defaults::archive_backend(),
            root_dir: defaults::archive_root(),
            public_url: defaults::public_url(),
            bucket: defaults::bucket(),
        }
    }
}

/// A sitemap or RSS/RDF feed belonging to an outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub outlet: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, outlet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outlet: outlet.into(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn respect_robots() -> bool {
        true
    }
    pub fn max_bytes() -> u64 {
        10 * 1024 * 1024
    }

    // Harvest defaults
    pub fn interval() -> u64 {
        5 * 60
    }

    // Storage defaults
    pub fn storage_root() -> PathBuf {
        PathBuf::from("storage")
    }

    // Archive defaults
    pub fn archive_backend() -> String {
        "local".into()
    }
    pub fn archive_root() -> PathBuf {
        PathBuf::from("storage/media")
    }
    pub fn public_url() -> String {
        "http://localhost/".into()
    }
    pub fn bucket() -> String {
        "wa-opengraph".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_feed() {
        let mut config = Config::default();
        config.feeds.push(FeedSource::new("not a url", "outlet"));
        assert!(config.validate().is_err());

        config.feeds = vec![FeedSource::new("https://example.com/rss", " ")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [harvest]
            interval_secs = 60

            [[feeds]]
            url = "https://example.com/sitemap.xml"
            outlet = "example"

            [[feeds]]
            url = "https://other.org/rss"
            outlet = "other"
            "#,
        )
        .unwrap();

        assert_eq!(config.harvest.interval_secs, 60);
        assert_eq!(config.crawler.max_concurrent, 5);
        assert!(config.crawler.respect_robots);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds_for(Some("other")).len(), 1);
        assert_eq!(config.feeds_for(None).len(), 2);
    }
}

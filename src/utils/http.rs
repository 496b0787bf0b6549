// src/utils/http.rs

//! HTTP client utilities.
//!
//! [`Fetcher`] is the seam between the harvester and the network. The
//! production implementation wraps `reqwest` and consults robots.txt; tests
//! substitute an in-memory fake.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;
use crate::utils::decode::decode_body;
use crate::utils::robots::RobotsRules;

/// A successful (2xx) response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub bytes: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            bytes: bytes.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body decoded with its declared charset, UTF-8 when none is given.
    pub fn text(&self) -> String {
        decode_body(&self.bytes, self.header("content-type"))
    }
}

/// Retrieves remote documents.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. Unless `force` is set, crawl-permission directives are
    /// honoured. Any non-2xx status is a [`FetchError::Status`].
    async fn fetch(&self, url: &str, force: bool) -> std::result::Result<FetchResponse, FetchError>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// `reqwest` backed fetcher with a per-origin robots.txt cache.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    config: CrawlerConfig,
    robots: Mutex<HashMap<String, Arc<RobotsRules>>>,
}

impl ReqwestFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            config: config.clone(),
            robots: Mutex::new(HashMap::new()),
        })
    }

    /// Rules for the origin of `url`, fetched on first use.
    async fn robots_for(&self, url: &Url) -> std::result::Result<Arc<RobotsRules>, FetchError> {
        let origin = url.origin().ascii_serialization();
        if let Some(rules) = self.robots.lock().await.get(&origin) {
            return Ok(Arc::clone(rules));
        }

        let robots_url = format!("{}/robots.txt", origin);
        let rules = match self.get(&robots_url).await {
            Ok(response) => RobotsRules::parse(&response.text(), &self.config.user_agent),
            Err(FetchError::Status { status, .. }) if status == 401 || status == 403 => {
                RobotsRules::deny_all()
            }
            Err(FetchError::Status { .. }) => RobotsRules::allow_all(),
            Err(e) => return Err(e),
        };
        log::debug!("Cached robots.txt rules for {}", origin);

        let rules = Arc::new(rules);
        self.robots
            .lock()
            .await
            .insert(origin, Arc::clone(&rules));
        Ok(rules)
    }

    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let max_bytes = self.config.max_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(FetchError::network(url, "response exceeds max_bytes"));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e))? {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::network(url, "response exceeds max_bytes"));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            bytes,
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, force: bool) -> std::result::Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url, "unsupported scheme"));
        }

        if !force && self.config.respect_robots {
            let rules = self.robots_for(&parsed).await?;
            let path = match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            };
            if !rules.is_allowed(&path) {
                return Err(FetchError::Disallowed {
                    url: url.to_string(),
                });
            }
        }

        let result = self.get(url).await;

        let delay = self.config.request_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::network(url, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let mut response = FetchResponse::ok("héllo");
        response
            .headers
            .insert("content-type".into(), "text/plain".into());
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "héllo");
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_text_honours_charset_header() {
        let mut response = FetchResponse::ok(b"<p>Fran\xe7ais</p>".to_vec());
        assert_eq!(response.text(), "<p>Fran\u{fffd}ais</p>");

        response
            .headers
            .insert("content-type".into(), "text/html; charset=iso-8859-1".into());
        assert_eq!(response.text(), "<p>Français</p>");
    }

    #[test]
    fn test_client_builds_from_config() {
        assert!(create_async_client(&CrawlerConfig::default()).is_ok());
        assert!(ReqwestFetcher::new(&CrawlerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_urls_rejected_before_network() {
        let fetcher = ReqwestFetcher::new(&CrawlerConfig::default()).unwrap();
        assert!(matches!(
            fetcher.fetch("not a url", false).await,
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            fetcher.fetch("ftp://example.com/feed", true).await,
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}

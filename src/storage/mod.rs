// src/storage/mod.rs

//! Storage abstractions for harvested articles and archived media.
//!
//! Two collaborators live here:
//!
//! - [`ArticleStore`] persists [`ArticleRecord`]s keyed by article URL
//! - [`ObjectArchive`] keeps content-addressed copies of remote media
//!
//! ## Local layout
//!
//! ```text
//! storage/
//! ├── index.json            # url → {file, outlet, publish_time}
//! ├── articles/
//! │   └── {sha256(url)}.json
//! └── media/
//!     └── {bucket}/{sha256(bytes)}
//! ```

pub mod archive;
pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, ArchiveError, PersistenceError, Result};
use crate::models::{ArchiveConfig, ArticleRecord, PutOutcome};
use crate::utils::http::Fetcher;

// Re-export for convenience
pub use archive::LocalArchive;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Archive;

/// Persistence backend for article records.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Every stored key.
    async fn list_known_keys(&self) -> std::result::Result<HashSet<String>, PersistenceError>;

    async fn get(&self, key: &str) -> std::result::Result<Option<ArticleRecord>, PersistenceError>;

    /// Store a new record. An existing key yields [`PutOutcome::Conflict`].
    async fn put(&self, record: &ArticleRecord) -> std::result::Result<PutOutcome, PersistenceError>;

    /// Overwrite an existing record wholesale. A missing key yields
    /// [`PutOutcome::NotFound`].
    async fn replace(
        &self,
        record: &ArticleRecord,
    ) -> std::result::Result<PutOutcome, PersistenceError>;
}

/// Content-addressed store for remote media.
#[async_trait]
pub trait ObjectArchive: Send + Sync {
    /// Copy `remote_url` into the archive and return the reference to use
    /// in its place.
    async fn archive(&self, remote_url: &str) -> std::result::Result<String, ArchiveError>;
}

/// Public reference of an archived object.
pub fn object_reference(public_url: &str, bucket: &str, digest: &str) -> String {
    format!("{}{}/{}", public_url, bucket, digest)
}

/// Build the configured archive backend, if archiving is enabled.
pub async fn build_archive(
    config: &ArchiveConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Option<Arc<dyn ObjectArchive>>> {
    if !config.enabled {
        return Ok(None);
    }
    match config.backend.as_str() {
        "local" => Ok(Some(Arc::new(LocalArchive::new(config, fetcher)))),
        #[cfg(feature = "s3")]
        "s3" => Ok(Some(Arc::new(S3Archive::from_env(config, fetcher).await))),
        other => Err(AppError::config(format!(
            "archive backend {:?} is not available in this build",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::utils::http::FetchResponse;

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch(
            &self,
            url: &str,
            _force: bool,
        ) -> std::result::Result<FetchResponse, FetchError> {
            Err(FetchError::network(url, "offline"))
        }
    }

    #[test]
    fn test_object_reference() {
        assert_eq!(
            object_reference("http://localhost/", "wa-opengraph", "abc"),
            "http://localhost/wa-opengraph/abc"
        );
    }

    #[tokio::test]
    async fn test_build_archive() {
        let mut config = ArchiveConfig::default();
        assert!(build_archive(&config, Arc::new(NoFetch)).await.unwrap().is_none());

        config.enabled = true;
        assert!(build_archive(&config, Arc::new(NoFetch)).await.unwrap().is_some());

        config.backend = "ftp".into();
        assert!(build_archive(&config, Arc::new(NoFetch)).await.is_err());
    }
}

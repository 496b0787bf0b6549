// src/storage/archive.rs

//! Local filesystem object archive.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::ArchiveError;
use crate::models::ArchiveConfig;
use crate::storage::{ObjectArchive, object_reference};
use crate::utils::http::Fetcher;
use crate::utils::sha256_hex;

/// Archive writing objects to `{root_dir}/{bucket}/{sha256}`.
pub struct LocalArchive {
    fetcher: Arc<dyn Fetcher>,
    root_dir: PathBuf,
    public_url: String,
    bucket: String,
}

impl LocalArchive {
    pub fn new(config: &ArchiveConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            root_dir: config.root_dir.clone(),
            public_url: config.public_url.clone(),
            bucket: config.bucket.clone(),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_object(&self, digest: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        let dir = self.root_dir.join(&self.bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(digest);
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectArchive for LocalArchive {
    async fn archive(&self, remote_url: &str) -> Result<String, ArchiveError> {
        // Media is fetched regardless of robots.txt
        let response = self.fetcher.fetch(remote_url, true).await?;
        let digest = sha256_hex(&response.bytes);
        self.write_object(&digest, &response.bytes).await?;

        log::debug!("Archived {} as {}", remote_url, digest);
        Ok(object_reference(&self.public_url, &self.bucket, &digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::utils::http::FetchResponse;
    use tempfile::TempDir;

    struct OneImage;

    #[async_trait]
    impl Fetcher for OneImage {
        async fn fetch(&self, url: &str, force: bool) -> Result<FetchResponse, FetchError> {
            assert!(force);
            if url == "https://x/a.png" {
                Ok(FetchResponse::ok(b"png-bytes".to_vec()))
            } else {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            }
        }
    }

    fn archive_in(dir: &TempDir) -> LocalArchive {
        let config = ArchiveConfig {
            enabled: true,
            root_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        LocalArchive::new(&config, Arc::new(OneImage))
    }

    #[tokio::test]
    async fn test_archive_is_content_addressed() {
        let dir = TempDir::new().unwrap();
        let archive = archive_in(&dir);

        let reference = archive.archive("https://x/a.png").await.unwrap();
        let digest = sha256_hex(b"png-bytes");
        assert_eq!(
            reference,
            format!("http://localhost/wa-opengraph/{}", digest)
        );

        let stored = std::fs::read(dir.path().join("wa-opengraph").join(&digest)).unwrap();
        assert_eq!(stored, b"png-bytes");

        // Second copy of the same bytes is a no-op
        assert_eq!(archive.archive("https://x/a.png").await.unwrap(), reference);
    }

    #[tokio::test]
    async fn test_archive_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let archive = archive_in(&dir);
        assert!(matches!(
            archive.archive("https://x/missing.png").await,
            Err(ArchiveError::Fetch(FetchError::Status { status: 404, .. }))
        ));
    }
}

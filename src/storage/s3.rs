// src/storage/s3.rs

//! AWS S3 object archive.
//!
//! Objects are uploaded to `s3://{bucket}/{sha256}` and referenced as
//! `{public_url}{bucket}/{sha256}`.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::ArchiveError;
use crate::models::ArchiveConfig;
use crate::storage::{ObjectArchive, object_reference};
use crate::utils::http::Fetcher;
use crate::utils::sha256_hex;

/// S3-backed object archive.
pub struct S3Archive {
    client: Client,
    fetcher: Arc<dyn Fetcher>,
    bucket: String,
    public_url: String,
}

impl S3Archive {
    pub fn new(client: Client, config: &ArchiveConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            client,
            fetcher,
            bucket: config.bucket.clone(),
            public_url: config.public_url.clone(),
        }
    }

    /// Create the archive with credentials from the environment.
    pub async fn from_env(config: &ArchiveConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config), config, fetcher)
    }
}

#[async_trait]
impl ObjectArchive for S3Archive {
    async fn archive(&self, remote_url: &str) -> Result<String, ArchiveError> {
        let response = self.fetcher.fetch(remote_url, true).await?;
        let digest = sha256_hex(&response.bytes);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&digest)
            .body(ByteStream::from(response.bytes.clone()));
        if let Some(content_type) = response.header("content-type") {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;

        log::info!("Uploaded {} to s3://{}/{}", remote_url, self.bucket, digest);
        Ok(object_reference(&self.public_url, &self.bucket, &digest))
    }
}

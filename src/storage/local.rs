// src/storage/local.rs

//! Local filesystem article store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── index.json            # url → {file, outlet, publish_time}
//! └── articles/
//!     └── {sha256(url)}.json
//! ```
//!
//! Writes are atomic (temp file, then rename) and serialised through one
//! async mutex, so the index never disagrees with the record files.

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::PersistenceError;
use crate::models::{ArticleRecord, PutOutcome};
use crate::storage::ArticleStore;
use crate::utils::sha256_hex;

const INDEX_FILE: &str = "index.json";

/// One line of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Record file, relative to the root
    pub file: String,
    pub outlet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<i64>,
}

type Index = BTreeMap<String, IndexEntry>;

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    ///
    /// The directory must exist before records can be stored.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Relative file for a record key.
    fn record_file(url: &str) -> String {
        format!("articles/{}.json", sha256_hex(url))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_index(&self) -> Result<Index, PersistenceError> {
        match self.read_bytes(INDEX_FILE).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Index::new()),
        }
    }

    /// Write the record file, then the index.
    async fn write_record(
        &self,
        index: &mut Index,
        record: &ArticleRecord,
    ) -> Result<PutOutcome, PersistenceError> {
        let file = Self::record_file(&record.url);
        let bytes = serde_json::to_vec_pretty(record)?;
        if let Err(e) = self.write_bytes(&file, &bytes).await {
            return outcome_of(e);
        }

        index.insert(
            record.url.clone(),
            IndexEntry {
                file,
                outlet: record.outlet.clone(),
                publish_time: record.canonical.wa.publish_time,
            },
        );
        let bytes = serde_json::to_vec_pretty(index)?;
        if let Err(e) = self.write_bytes(INDEX_FILE, &bytes).await {
            return outcome_of(e);
        }
        Ok(PutOutcome::Stored)
    }

    async fn root_exists(&self) -> Result<bool, PersistenceError> {
        Ok(tokio::fs::try_exists(&self.root_dir).await?)
    }
}

/// Map write failures onto the store outcomes callers drop records on.
fn outcome_of(error: std::io::Error) -> Result<PutOutcome, PersistenceError> {
    match error.kind() {
        ErrorKind::PermissionDenied => Ok(PutOutcome::Unauthorized),
        ErrorKind::NotFound => Ok(PutOutcome::NotFound),
        _ => Err(PersistenceError::Io(error)),
    }
}

#[async_trait]
impl ArticleStore for LocalStorage {
    async fn list_known_keys(&self) -> Result<HashSet<String>, PersistenceError> {
        Ok(self.read_index().await?.into_keys().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<ArticleRecord>, PersistenceError> {
        let index = self.read_index().await?;
        let Some(entry) = index.get(key) else {
            return Ok(None);
        };
        match self.read_bytes(&entry.file).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => {
                log::warn!("Index lists {} but {} is missing", key, entry.file);
                Ok(None)
            }
        }
    }

    async fn put(&self, record: &ArticleRecord) -> Result<PutOutcome, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        if !self.root_exists().await? {
            return Ok(PutOutcome::NotFound);
        }

        let mut index = self.read_index().await?;
        if index.contains_key(&record.url) {
            return Ok(PutOutcome::Conflict);
        }
        self.write_record(&mut index, record).await
    }

    async fn replace(&self, record: &ArticleRecord) -> Result<PutOutcome, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        if !self.root_exists().await? {
            return Ok(PutOutcome::NotFound);
        }

        let mut index = self.read_index().await?;
        if !index.contains_key(&record.url) {
            return Ok(PutOutcome::NotFound);
        }
        self.write_record(&mut index, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRecord, CrawlProvenance, GenericNode};
    use tempfile::TempDir;

    fn record(url: &str, publish_time: Option<i64>) -> ArticleRecord {
        let mut canonical = CanonicalRecord::default();
        canonical.og.url = url.to_string();
        canonical.wa.outlet = "example".into();
        canonical.wa.publish_time = publish_time;
        ArticleRecord {
            url: url.to_string(),
            outlet: "example".into(),
            html: "<html></html>".into(),
            text: "body".into(),
            metadata: GenericNode::mapping([("url", url)]),
            canonical,
            provenance: CrawlProvenance::new(1_600_000_000, "https://x/sitemap.xml"),
            manual: false,
        }
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path());

        let rec = record("http://x/1", Some(1_577_836_800));
        assert_eq!(store.put(&rec).await.unwrap(), PutOutcome::Stored);
        assert_eq!(store.get("http://x/1").await.unwrap(), Some(rec));
        assert!(store.get("http://x/2").await.unwrap().is_none());

        let keys = store.list_known_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("http://x/1"));
    }

    #[tokio::test]
    async fn test_index_layout() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path());
        store.put(&record("http://x/1", Some(42))).await.unwrap();

        let index: Index =
            serde_json::from_slice(&std::fs::read(dir.path().join(INDEX_FILE)).unwrap()).unwrap();
        let entry = &index["http://x/1"];
        assert_eq!(entry.file, format!("articles/{}.json", sha256_hex("http://x/1")));
        assert_eq!(entry.outlet, "example");
        assert_eq!(entry.publish_time, Some(42));
        assert!(dir.path().join(&entry.file).exists());
    }

    #[tokio::test]
    async fn test_duplicate_put_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path());
        assert_eq!(
            store.put(&record("http://x/1", None)).await.unwrap(),
            PutOutcome::Stored
        );
        assert_eq!(
            store.put(&record("http://x/1", None)).await.unwrap(),
            PutOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn test_replace_overwrites_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path());
        store.put(&record("http://x/1", None)).await.unwrap();

        let mut updated = record("http://x/1", Some(7));
        updated.canonical.og.title = Some("New".into());
        assert_eq!(store.replace(&updated).await.unwrap(), PutOutcome::Stored);

        let stored = store.get("http://x/1").await.unwrap().unwrap();
        assert_eq!(stored.canonical.og.title.as_deref(), Some("New"));
        assert_eq!(stored.canonical.wa.publish_time, Some(7));

        assert_eq!(
            store.replace(&record("http://x/2", None)).await.unwrap(),
            PutOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path().join("absent"));
        assert_eq!(
            store.put(&record("http://x/1", None)).await.unwrap(),
            PutOutcome::NotFound
        );
        assert!(store.list_known_keys().await.unwrap().is_empty());
    }
}

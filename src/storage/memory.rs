// src/storage/memory.rs

//! In-memory article store.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::models::{ArticleRecord, PutOutcome};
use crate::storage::ArticleStore;

/// Article store backed by a map; used for tests and dry runs.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, ArticleRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = ArticleRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.url.clone(), r)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of every record, ordered by key.
    pub async fn records(&self) -> Vec<ArticleRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn list_known_keys(&self) -> Result<HashSet<String>, PersistenceError> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<ArticleRecord>, PersistenceError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: &ArticleRecord) -> Result<PutOutcome, PersistenceError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.url) {
            return Ok(PutOutcome::Conflict);
        }
        records.insert(record.url.clone(), record.clone());
        Ok(PutOutcome::Stored)
    }

    async fn replace(&self, record: &ArticleRecord) -> Result<PutOutcome, PersistenceError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.url) {
            Some(existing) => {
                *existing = record.clone();
                Ok(PutOutcome::Stored)
            }
            None => Ok(PutOutcome::NotFound),
        }
    }
}

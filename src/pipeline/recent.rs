// src/pipeline/recent.rs

//! Listing recently published articles.

use chrono::{DateTime, Duration, Utc};

use crate::error::PersistenceError;
use crate::models::CanonicalRecord;
use crate::storage::ArticleStore;

/// Epoch seconds `days` before `now`.
pub fn since_days(now: DateTime<Utc>, days: u32) -> i64 {
    (now - Duration::days(i64::from(days))).timestamp()
}

/// Canonical records published at or after `since_epoch`, newest first.
///
/// Records without a publish time are not listed.
pub async fn recent(
    store: &dyn ArticleStore,
    since_epoch: i64,
) -> Result<Vec<CanonicalRecord>, PersistenceError> {
    let keys = store.list_known_keys().await?;

    let mut found = Vec::new();
    for key in keys {
        match store.get(&key).await {
            Ok(Some(record)) => {
                if record
                    .canonical
                    .wa
                    .publish_time
                    .is_some_and(|t| t >= since_epoch)
                {
                    found.push(record.canonical);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Cannot read {}: {}", key, e),
        }
    }

    found.sort_by(|a, b| {
        b.wa.publish_time
            .cmp(&a.wa.publish_time)
            .then_with(|| a.og.url.cmp(&b.og.url))
    });
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, CrawlProvenance, GenericNode};
    use crate::storage::MemoryStorage;

    fn record(url: &str, publish_time: Option<i64>) -> ArticleRecord {
        let mut canonical = CanonicalRecord::default();
        canonical.og.url = url.to_string();
        canonical.wa.publish_time = publish_time;
        ArticleRecord {
            url: url.to_string(),
            outlet: "x".into(),
            html: String::new(),
            text: String::new(),
            metadata: GenericNode::empty(),
            canonical,
            provenance: CrawlProvenance::new(0, "https://x/feed"),
            manual: false,
        }
    }

    #[test]
    fn test_since_days() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        assert_eq!(since_days(now, 3), 1_000_000 - 3 * 86_400);
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let store = MemoryStorage::with_records([
            record("http://x/old", Some(100)),
            record("http://x/mid", Some(200)),
            record("http://x/new", Some(300)),
            record("http://x/undated", None),
        ]);
        let listed = recent(&store, 150).await.unwrap();
        let urls: Vec<&str> = listed.iter().map(|c| c.og.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x/new", "http://x/mid"]);
    }
}

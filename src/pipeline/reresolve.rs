// src/pipeline/reresolve.rs

//! Re-running field inference over stored records.
//!
//! Used after the resolver changes: every stored record's metadata tree is
//! resolved again and its canonical record replaced wholesale. Records edited
//! by hand are left alone.

use crate::error::PersistenceError;
use crate::models::{ArticleRecord, PutOutcome};
use crate::services::resolve;
use crate::storage::ArticleStore;

/// Counters for one re-resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReresolveReport {
    pub examined: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_manual: usize,
    pub failures: usize,
}

/// Re-resolve stored records, optionally for one outlet only.
pub async fn reresolve(
    store: &dyn ArticleStore,
    outlet: Option<&str>,
) -> Result<ReresolveReport, PersistenceError> {
    let mut keys: Vec<String> = store.list_known_keys().await?.into_iter().collect();
    keys.sort();

    let mut report = ReresolveReport::default();
    for key in keys {
        let record = match store.get(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                report.failures += 1;
                log::warn!("Cannot read {}: {}", key, e);
                continue;
            }
        };
        if outlet.is_some_and(|o| record.outlet != o) {
            continue;
        }

        report.examined += 1;
        if record.manual {
            report.skipped_manual += 1;
            log::debug!("Leaving manually edited {} alone", key);
            continue;
        }

        let canonical = resolve(&record.metadata, &record.outlet);
        if canonical == record.canonical {
            report.unchanged += 1;
            continue;
        }

        let updated = ArticleRecord {
            canonical,
            ..record
        };
        match store.replace(&updated).await {
            Ok(PutOutcome::Stored) => report.updated += 1,
            Ok(outcome) => {
                report.failures += 1;
                log::warn!("Store refused update of {}: {:?}", key, outcome);
            }
            Err(e) => {
                report.failures += 1;
                log::warn!("Cannot update {}: {}", key, e);
            }
        }
    }

    log::info!(
        "Re-resolved {} record(s): {} updated, {} unchanged, {} manual, {} failed",
        report.examined,
        report.updated,
        report.unchanged,
        report.skipped_manual,
        report.failures
    );
    Ok(report)
}

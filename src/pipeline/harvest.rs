// src/pipeline/harvest.rs

//! The polling loop.
//!
//! Each cycle walks `FetchingFeeds → Diffing → FetchingArticles →
//! Extracting → Persisting`, then the loop sleeps until the next cycle.
//! A failure for one feed, article or record is logged and skipped; it never
//! ends the cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::models::{
    ArticleRecord, Candidate, Config, CrawlProvenance, FeedSource, GenericNode, PutOutcome,
};
use crate::pipeline::diff::{DiffCalculator, DiscoveredItem};
use crate::services::{ArticleExtractor, ExtractedPage, aggregator, merge, resolve};
use crate::storage::ArticleStore;
use crate::utils::http::{FetchResponse, Fetcher};
use crate::utils::is_media_url;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where a cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    FetchingFeeds,
    Diffing,
    FetchingArticles,
    Extracting,
    Persisting,
    Sleeping,
}

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds_total: usize,
    pub feed_failures: usize,
    pub discovered: usize,
    pub new_items: usize,
    pub article_failures: usize,
    pub stored: usize,
    pub dropped: usize,
    /// Known keys could not be listed; nothing was fetched
    pub skipped: bool,
    pub cancelled: bool,
}

/// Drives harvest cycles over a set of feeds.
pub struct Harvester {
    config: Arc<Config>,
    feeds: Vec<FeedSource>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ArticleStore>,
    extractor: ArticleExtractor,
    clock: Arc<dyn Clock>,
}

impl Harvester {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn Fetcher>, store: Arc<dyn ArticleStore>) -> Self {
        Self {
            feeds: config.feeds.clone(),
            config,
            fetcher,
            store,
            extractor: ArticleExtractor::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Restrict harvesting to the feeds of one outlet.
    pub fn with_outlet(mut self, outlet: Option<&str>) -> Self {
        self.feeds = self.config.feeds_for(outlet);
        self
    }

    pub fn with_extractor(mut self, extractor: ArticleExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    fn enter(&self, stage: CycleStage) {
        log::debug!("Harvest stage: {:?}", stage);
    }

    /// Run cycles until cancelled, or until `max_cycles` have completed.
    ///
    /// Returns the number of cycles run.
    pub async fn run(&self, cancel: &CancellationToken, max_cycles: Option<usize>) -> usize {
        let interval = self.config.harvest.interval();
        let mut cycles = 0;

        while !cancel.is_cancelled() {
            self.run_cycle(cancel).await;
            cycles += 1;
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            self.enter(CycleStage::Sleeping);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.enter(CycleStage::Idle);
        cycles
    }

    /// Run one full cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport {
            feeds_total: self.feeds.len(),
            ..CycleReport::default()
        };
        let concurrency = self.config.crawler.max_concurrent.max(1);
        let fetch_time = self.clock.now().timestamp();

        // Stage 1: feeds, in configured order so duplicate keys merge stably
        self.enter(CycleStage::FetchingFeeds);
        let mut discovery = DiffCalculator::new();
        let mut feed_stream = stream::iter(self.feeds.iter())
            .map(|feed| async move { (feed, self.fetch_feed(feed, fetch_time, cancel).await) })
            .buffered(concurrency);

        while let Some((feed, result)) = feed_stream.next().await {
            match result {
                Ok(candidates) => {
                    log::debug!("{} candidate(s) from {}", candidates.len(), feed.url);
                    discovery.add(&feed.outlet, candidates);
                }
                Err(e) => {
                    report.feed_failures += 1;
                    log::warn!("Skipping feed {} ({}): {}", feed.url, feed.outlet, e);
                }
            }
        }
        drop(feed_stream);

        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        // Stage 2: diff against a fresh snapshot of the store
        self.enter(CycleStage::Diffing);
        let known = match self.store.list_known_keys().await {
            Ok(known) => known,
            Err(e) => {
                log::error!("Cannot list known keys, skipping cycle: {}", e);
                report.skipped = true;
                return report;
            }
        };
        let diff = discovery.calculate(&known);
        report.discovered = diff.discovered;
        report.new_items = diff.change_count();
        if !diff.has_changes() {
            log::info!("Nothing new among {} discovered key(s)", diff.discovered);
        }

        // Stage 3: articles; records are persisted by this task alone
        self.enter(CycleStage::FetchingArticles);
        let mut article_stream = stream::iter(diff.new_items)
            .map(|item| async move { self.harvest_article(item, cancel).await })
            .buffer_unordered(concurrency);

        while let Some(result) = article_stream.next().await {
            match result {
                Ok(record) => self.persist(&record, &mut report).await,
                Err(FetchError::Cancelled { .. }) => report.cancelled = true,
                Err(e) => {
                    report.article_failures += 1;
                    log::warn!("Skipping article {}: {}", e.url(), e);
                }
            }
        }

        log::info!(
            "Cycle done: {} feed(s) ({} failed), {} discovered, {} new, {} stored, {} dropped, {} article failure(s)",
            report.feeds_total,
            report.feed_failures,
            report.discovered,
            report.new_items,
            report.stored,
            report.dropped,
            report.article_failures
        );
        self.enter(CycleStage::Idle);
        report
    }

    async fn fetch_feed(
        &self,
        feed: &FeedSource,
        fetch_time: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, FetchError> {
        let response = self.fetch_guarded(&feed.url, cancel).await?;
        let provenance = CrawlProvenance::new(fetch_time, &feed.url);
        Ok(aggregator::dispatch(&response.text(), &provenance))
    }

    /// Fetch with the configured deadline, giving up early on cancellation.
    async fn fetch_guarded(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let deadline = self.config.crawler.timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(cancelled()),
            result = tokio::time::timeout(deadline, self.fetcher.fetch(url, false)) => {
                result.unwrap_or_else(|_| Err(FetchError::Timeout { url: url.to_string() }))
            }
        }
    }

    async fn harvest_article(
        &self,
        item: DiscoveredItem,
        cancel: &CancellationToken,
    ) -> Result<ArticleRecord, FetchError> {
        let DiscoveredItem { candidate, outlet } = item;

        let page = if is_media_url(&candidate.key) {
            log::debug!("Not fetching media URL {}", candidate.key);
            ExtractedPage::default()
        } else {
            let response = self.fetch_guarded(&candidate.key, cancel).await?;
            log::debug!("{:?} {}", CycleStage::Extracting, candidate.key);
            self.extractor.extract(&candidate.key, &response.text()).await
        };

        let metadata = merge(candidate.tree, &GenericNode::mapping([("meta", page.meta)]));
        let canonical = resolve(&metadata, &outlet);

        Ok(ArticleRecord {
            url: candidate.key,
            outlet,
            html: page.html,
            text: page.text,
            metadata,
            canonical,
            provenance: candidate.provenance,
            manual: false,
        })
    }

    async fn persist(&self, record: &ArticleRecord, report: &mut CycleReport) {
        log::debug!("{:?} {}", CycleStage::Persisting, record.url);
        match self.store.put(record).await {
            Ok(PutOutcome::Stored) => {
                report.stored += 1;
                log::info!("Stored {} ({})", record.url, record.outlet);
            }
            Ok(outcome) => {
                report.dropped += 1;
                log::warn!("Store refused {}: {:?}", record.url, outcome);
            }
            Err(e) => {
                report.dropped += 1;
                log::warn!("Dropping {}: {}", record.url, e);
            }
        }
    }
}

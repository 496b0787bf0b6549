// src/models/record.rs

//! Harvested item and canonical article records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::GenericNode;

/// When and from which feed an item was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProvenance {
    /// Epoch seconds at which the feed was fetched
    pub fetch_time: i64,

    /// URL of the feed the item was found in
    pub source_url: String,
}

impl CrawlProvenance {
    pub fn new(fetch_time: i64, source_url: impl Into<String>) -> Self {
        Self {
            fetch_time,
            source_url: source_url.into(),
        }
    }
}

/// One item discovered in a sitemap or feed, not yet fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Article URL, the record key
    pub key: String,

    /// `{url, sitemap: {...}}` or `{url, rss: {..., channel, item}}`
    pub tree: GenericNode,

    pub provenance: CrawlProvenance,
}

/// Author block of the `article` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
}

/// `og` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenGraph {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

/// `article` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
}

/// `wa` section: harvester bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HarvestMeta {
    pub outlet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<i64>,
}

/// Fixed-schema Open Graph style record, keyed by `og.url`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub og: OpenGraph,
    pub article: ArticleMeta,
    pub wa: HarvestMeta,

    /// Canonical-namespace values with no fixed field (`og.type`,
    /// `music.*`, `video.*`, ...), kept as found.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, GenericNode>,
}

impl CanonicalRecord {
    pub fn key(&self) -> &str {
        &self.og.url
    }
}

/// Everything stored for one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub outlet: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: String,

    /// Candidate tree merged with the page metadata, input to the resolver
    pub metadata: GenericNode,

    pub canonical: CanonicalRecord,
    pub provenance: CrawlProvenance,

    /// Canonical record was edited by hand; re-resolution leaves it alone.
    #[serde(default)]
    pub manual: bool,
}

/// Outcome of storing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// A record with this key already exists
    Conflict,
    Unauthorized,
    NotFound,
}

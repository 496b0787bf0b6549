// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod node;
mod record;

// Re-export all public types
pub use config::{ArchiveConfig, Config, CrawlerConfig, FeedSource, HarvestConfig, StorageConfig};
pub use node::{CONTENT_KEY, GenericNode, NodeMap};
pub use record::{
    ArticleMeta, ArticleRecord, Author, Candidate, CanonicalRecord, CrawlProvenance, HarvestMeta,
    OpenGraph, PutOutcome,
};

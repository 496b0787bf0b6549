// src/services/mod.rs

//! Service layer for the harvester.
//!
//! This module contains the document processing stages:
//! - Markup to generic tree (`parser`)
//! - Deep merge of generic trees (`merge`)
//! - Sitemap and feed item extraction (`aggregator`)
//! - Article page extraction (`ArticleExtractor`)
//! - Canonical record inference (`resolver`)

pub mod aggregator;
mod article;
pub mod merge;
pub mod parser;
pub mod resolver;

pub use aggregator::{FeedKind, dispatch};
pub use article::{ArticleExtractor, ExtractedPage};
pub use merge::{merge, split_namespace};
pub use parser::{Dialect, parse};
pub use resolver::{normalize_tags, resolve};

// src/lib.rs

//! Harvester Library
//!
//! Polls sitemaps and RSS/RDF feeds, fetches newly discovered articles and
//! infers an Open Graph style canonical record for each one.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

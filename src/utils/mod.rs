// src/utils/mod.rs

//! Utility functions and helpers.

pub mod decode;
pub mod http;
pub mod log;
pub mod robots;
pub mod time;

use sha2::{Digest, Sha256};
use url::Url;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Whether a URL points at media the harvester does not read.
pub fn is_media_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());
    path.ends_with(".mp3") || path.ends_with(".pdf")
}

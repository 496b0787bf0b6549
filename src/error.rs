// src/error.rs

//! Unified error handling for the harvester.
//!
//! Every per-item failure in a harvest cycle is one of the recoverable kinds
//! below. [`AppError`] wraps them for the startup and CLI paths, where an
//! error does end the command.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A remote document could not be retrieved
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A fetched document did not have the expected structure
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The article store rejected or failed an operation
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The object archive failed
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Failure to retrieve a feed, article or media object.
///
/// Always recoverable: the caller skips the item and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("robots.txt disallows {url}")]
    Disallowed { url: String },

    #[error("fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// The URL the failed request was for.
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Network { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Disallowed { url }
            | Self::Cancelled { url } => url,
        }
    }
}

/// A document was fetched but is not the shape we expected.
///
/// Recoverable: the document yields no candidates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("document has no root element")]
    EmptyDocument,

    #[error("no known schema for root element <{root}>")]
    UnknownSchema { root: String },

    #[error("required element <{element}> is missing")]
    MissingElement { element: String },
}

/// The article store failed.
///
/// Recoverable: the record is dropped for this cycle.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The object archive could not store a media object.
///
/// Never fatal: the remote reference is kept.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive upload failed: {0}")]
    Upload(String),
}

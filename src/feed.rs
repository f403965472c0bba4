//! Feed fetching and normalization.
//!
//! Every supported document format is reduced to a list of [`NormalizedItem`]s
//! carrying a title, a link and a publication instant.

pub mod fetcher;
pub mod parser;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use fetcher::{fetch_all, FetchBatch, FetchFeed, FetchedItem, HttpFetcher};
pub use parser::{parse, parse_at, FeedFormat, ParsedFeed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("format not recognized")]
    UnknownFormat,
}

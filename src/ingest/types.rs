// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single entry as it came out of a feed, before mapping to a `NewsItem`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedEntry {
    pub title: String,
    pub link: String,
    /// Resolved from the feed's date string; `None` when the entry carried no
    /// parseable date (callers substitute "now" so a bad date never drops a story).
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub author: String,
    pub image_url: String,
}

/// A retrieved story, normalized across feed formats and scrape results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    /// Display name of the originating source; matching elsewhere is by string equality.
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    /// Stand-in record for a source that could not be ingested. Placeholders are
    /// excluded from dedup and prompt construction.
    pub is_placeholder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Outcome of one source in a fetch cycle. Exactly one per attempted source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchStatus {
    Success { count: usize },
    Empty,
    Failed { message: String },
    Queued,
}

impl FetchStatus {
    pub fn contributed(&self) -> bool {
        matches!(self, FetchStatus::Success { count } if *count > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFetchResult {
    pub source_id: String,
    pub source_name: String,
    #[serde(flatten)]
    pub status: FetchStatus,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("scrape failed ({0})")]
    ScrapeStatus(u16),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

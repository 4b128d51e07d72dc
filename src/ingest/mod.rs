// src/ingest/mod.rs
pub mod feed;
pub mod scrape;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::ingest::feed::FeedFetcher;
use crate::ingest::types::{
    FetchError, FetchStatus, NewsItem, RawFeedEntry, SourceFetchResult,
};
use crate::sources::Source;

const QUEUED_SUMMARY: &str = "Add an RSS feed or enable webpage scrape for this source.";
const STALE_NOTICE: &str = "Older than the selected time window.";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from feeds.");
        describe_counter!("ingest_items_total", "Items kept after windowing.");
        describe_counter!("ingest_source_errors_total", "Source fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts of the last fetch cycle.");
    });
}

/// Normalize summary text pulled from feeds: decode entities, strip markup,
/// collapse whitespace. Capped so a full-article description stays bounded.
pub fn clean_html(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Transport seam: the aggregator only needs "give me feed entries" and
/// "give me a page", so tests can swap in fixtures.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawFeedEntry>, FetchError>;
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl FeedClient for FeedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawFeedEntry>, FetchError> {
        self.fetch(url).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        FeedFetcher::fetch_page(self, url).await
    }
}

pub struct FetchOutcome {
    pub items: Vec<NewsItem>,
    pub results: Vec<SourceFetchResult>,
}

/// Fetch every source concurrently and merge the results, newest first.
/// A failing source contributes a `failed` result and zero items; it never
/// aborts the cycle. The final sort is the only ordering guarantee here;
/// dedup and preference ranking happen downstream.
pub async fn fetch_recent(
    client: &dyn FeedClient,
    sources: &[Source],
    window_hours: u32,
) -> FetchOutcome {
    ensure_metrics_described();
    let cutoff = Utc::now() - chrono::Duration::hours(i64::from(window_hours));

    let fetches = sources.iter().map(|s| fetch_source(client, s, cutoff));
    let per_source = futures_util::future::join_all(fetches).await;

    let mut items = Vec::new();
    let mut results = Vec::with_capacity(sources.len());
    for (source_items, result) in per_source {
        items.extend(source_items);
        results.push(result);
    }
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    counter!("ingest_items_total").increment(items.len() as u64);
    gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);

    FetchOutcome { items, results }
}

async fn fetch_source(
    client: &dyn FeedClient,
    source: &Source,
    cutoff: DateTime<Utc>,
) -> (Vec<NewsItem>, SourceFetchResult) {
    let fetched_at = Utc::now();
    let result = |status: FetchStatus| SourceFetchResult {
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        status,
        fetched_at,
    };

    let mapped = match source.feed_url() {
        Some(url) => match client.fetch_feed(url).await {
            Ok(entries) => Ok(map_entries(source, entries)),
            // A dead feed on a scrape-permitted source falls back to the page.
            Err(_) if source.allow_scrape => scrape_source(client, source).await,
            Err(err) => Err(err),
        },
        None if source.allow_scrape => scrape_source(client, source).await,
        None => {
            // No feed, no scrape permission: visible feedback instead of silence.
            let placeholder = NewsItem {
                id: Uuid::new_v4(),
                title: format!("Source queued: {}", source.name),
                source: source.name.clone(),
                url: source.url.clone(),
                published_at: fetched_at,
                summary: QUEUED_SUMMARY.to_string(),
                is_placeholder: true,
                author: None,
                image_url: None,
            };
            return (vec![placeholder], result(FetchStatus::Queued));
        }
    };

    match mapped {
        Ok(mapped) => {
            let fresh: Vec<NewsItem> = mapped
                .iter()
                .filter(|i| i.published_at >= cutoff)
                .cloned()
                .collect();
            if fresh.is_empty() && !mapped.is_empty() {
                // Nothing inside the window but the feed is alive: surface the
                // single most recent entry with an explicit staleness notice.
                if let Some(mut latest) = mapped.into_iter().max_by_key(|i| i.published_at) {
                    latest.summary = if latest.summary.is_empty() {
                        STALE_NOTICE.to_string()
                    } else {
                        format!("{}\n\n{}", latest.summary, STALE_NOTICE)
                    };
                    return (vec![latest], result(FetchStatus::Empty));
                }
                (Vec::new(), result(FetchStatus::Empty))
            } else {
                let status = if fresh.is_empty() {
                    FetchStatus::Empty
                } else {
                    FetchStatus::Success { count: fresh.len() }
                };
                (fresh, result(status))
            }
        }
        Err(err) => {
            tracing::warn!(source = %source.name, error = %err, "source fetch failed");
            counter!("ingest_source_errors_total").increment(1);
            (
                Vec::new(),
                result(FetchStatus::Failed {
                    message: err.to_string(),
                }),
            )
        }
    }
}

async fn scrape_source(
    client: &dyn FeedClient,
    source: &Source,
) -> Result<Vec<NewsItem>, FetchError> {
    let html = client.fetch_page(&source.url).await?;
    scrape::scrape_headlines(source, &html, Utc::now())
}

fn map_entries(source: &Source, entries: Vec<RawFeedEntry>) -> Vec<NewsItem> {
    let now = Utc::now();
    entries
        .into_iter()
        .filter(|e| !e.title.is_empty())
        .map(|e| {
            let link = e.link.trim();
            NewsItem {
                id: Uuid::new_v4(),
                title: e.title,
                source: source.name.clone(),
                url: if link.is_empty() {
                    source.url.clone()
                } else {
                    link.to_string()
                },
                published_at: e.published_at.unwrap_or(now),
                summary: clean_html(&e.summary),
                is_placeholder: false,
                author: (!e.author.is_empty()).then_some(e.author),
                image_url: (!e.image_url.is_empty()).then_some(e.image_url),
            }
        })
        .collect()
}

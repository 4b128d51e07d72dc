// src/ingest/feed.rs
//! Format-tolerant RSS/Atom fetching and parsing.
//!
//! One pull-based pass handles both formats: element names are matched
//! case-insensitively with namespace prefixes stripped, so `item`/`entry`,
//! `pubDate`/`published`/`updated`, and `description`/`summary`/`content`
//! all land in the same entry fields without a schema switch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::ingest::types::{FetchError, RawFeedEntry};

/// HTTP client for feed endpoints and scrape-mode pages.
pub struct FeedFetcher {
    http: reqwest::Client,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFetcher {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; TheAIBrief/1.0)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    /// Fetch and parse one feed URL. An empty entry list is a valid outcome
    /// (malformed XML yields whatever parsed before the error, possibly nothing).
    pub async fn fetch(&self, url: &str) -> Result<Vec<RawFeedEntry>, FetchError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let body = resp.text().await?;
        Ok(parse_feed(&body))
    }

    /// Fetch raw HTML for scrape-mode sources.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::ScrapeStatus(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

/// Parse an RSS 2.0 or Atom document into raw entries. Never fails: a broken
/// document returns the entries collected before the first hard reader error.
pub fn parse_feed(xml: &str) -> Vec<RawFeedEntry> {
    let t0 = std::time::Instant::now();
    let scrubbed = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&scrubbed);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut draft = EntryDraft::default();
    let mut in_entry = false;
    let mut element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = qualified_name(&e);
                if name == "item" || name == "entry" {
                    in_entry = true;
                    draft = EntryDraft::default();
                    element.clear();
                    continue;
                }
                if in_entry {
                    apply_attributes(&e, &name, &mut draft);
                    element = local_name(&name).to_string();
                }
            }
            Ok(Event::Empty(e)) => {
                // Atom links are usually self-closing: <link href="..."/>
                if in_entry {
                    let name = qualified_name(&e);
                    apply_attributes(&e, &name, &mut draft);
                }
            }
            Ok(Event::Text(t)) => {
                if in_entry {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).into_owned());
                    draft.append(&element, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if in_entry {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    draft.append(&element, &text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if name == "item" || name == "entry" {
                    in_entry = false;
                    if let Some(entry) = draft.finish() {
                        entries.push(entry);
                    }
                    draft = EntryDraft::default();
                }
                element.clear();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::warn!(error = %err, "feed parse stopped early");
                break;
            }
            Ok(_) => {}
        }
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_entries_total").increment(entries.len() as u64);
    entries
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn attribute_value(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().filter_map(Result::ok).find_map(|a| {
        if a.key.as_ref().eq_ignore_ascii_case(key.as_bytes()) {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

fn apply_attributes(e: &BytesStart<'_>, qualified: &str, draft: &mut EntryDraft) {
    match qualified {
        // media:content keeps its prefix here so Atom's text <content> stays a summary field
        "enclosure" | "media:content" => {
            if draft.image_url.is_empty() {
                if let Some(url) = attribute_value(e, "url").filter(|u| !u.is_empty()) {
                    draft.image_url = url;
                }
            }
        }
        _ if local_name(qualified) == "link" => {
            if let Some(href) = attribute_value(e, "href").filter(|h| !h.is_empty()) {
                draft.link = href;
            }
        }
        _ => {}
    }
}

#[derive(Default)]
struct EntryDraft {
    title: String,
    link: String,
    date: String,
    summary: String,
    author: String,
    image_url: String,
}

impl EntryDraft {
    fn append(&mut self, element: &str, text: &str) {
        match element {
            "title" => self.title.push_str(text),
            "link" => {
                if self.link.is_empty() {
                    self.link.push_str(text);
                }
            }
            "pubdate" | "published" | "updated" => self.date.push_str(text),
            "description" | "summary" | "content" => self.summary.push_str(text),
            "author" | "creator" => self.author.push_str(text),
            _ => {}
        }
    }

    fn finish(self) -> Option<RawFeedEntry> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(RawFeedEntry {
            title,
            link: self.link.trim().to_string(),
            published_at: parse_feed_date(&self.date),
            summary: self.summary.trim().to_string(),
            author: self.author.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
        })
    }
}

// Feeds observed in the wild use one of these shapes; anything else falls back
// to "now" upstream so a bad date never drops an otherwise-valid story.
const DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.3f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Try the known date formats in order; `None` when nothing matches.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // rfc2822 first: it also covers obsolete zone names ("GMT") that %z rejects.
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

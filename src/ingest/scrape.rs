// src/ingest/scrape.rs
//! Same-origin headline scraping for sources without a usable feed.
//!
//! Anchors inside article/heading containers are preferred; the generic
//! anchor pass only runs when those come up short. The same-origin filter
//! keeps navigation, ad, and social links out of the candidate set.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use url::Url;
use uuid::Uuid;

use crate::ingest::types::{FetchError, NewsItem};
use crate::sources::Source;

const MAX_CANDIDATES: usize = 12;
const MIN_TITLE_LEN: usize = 20;
const MAX_TITLE_LEN: usize = 140;

fn normalize_host(host: &str) -> String {
    host.trim_start_matches("www.").to_ascii_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract headline candidates from a page. Pure so fixtures can drive it;
/// `now` becomes the `published_at` of every candidate (pages carry no dates).
pub fn scrape_headlines(
    source: &Source,
    html: &str,
    now: DateTime<Utc>,
) -> Result<Vec<NewsItem>, FetchError> {
    let base = Url::parse(&source.url).map_err(|_| FetchError::InvalidUrl(source.url.clone()))?;
    let base_host = normalize_host(base.host_str().unwrap_or_default());
    let document = Html::parse_document(html);

    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<(String, String)> = Vec::new();

    for raw_selector in ["article a", "h2 a", "h3 a", "a"] {
        let selector = Selector::parse(raw_selector).expect("static selector");
        for element in document.select(&selector) {
            let text = collapse_whitespace(&element.text().collect::<String>());
            let len = text.chars().count();
            if len < MIN_TITLE_LEN || len > MAX_TITLE_LEN {
                continue;
            }
            let href = element.value().attr("href").unwrap_or_default();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("mailto:")
                || href.starts_with("javascript:")
            {
                continue;
            }
            let absolute = match base.join(href) {
                Ok(url) => url,
                Err(_) => continue,
            };
            if normalize_host(absolute.host_str().unwrap_or_default()) != base_host {
                continue;
            }
            let link = absolute.to_string();
            if !seen.insert(link.clone()) {
                continue;
            }
            candidates.push((text, link));
        }
        if candidates.len() >= MAX_CANDIDATES {
            break;
        }
    }

    if candidates.is_empty() {
        let title_selector = Selector::parse("title").expect("static selector");
        if let Some(title) = document
            .select(&title_selector)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
        {
            candidates.push((title, base.to_string()));
        }
    }

    candidates.truncate(MAX_CANDIDATES);
    Ok(candidates
        .into_iter()
        .map(|(title, link)| NewsItem {
            id: Uuid::new_v4(),
            title,
            source: source.name.clone(),
            url: link,
            published_at: now,
            summary: String::new(),
            is_placeholder: false,
            author: None,
            image_url: None,
        })
        .collect())
}

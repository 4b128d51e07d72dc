// src/dedup.rs
//! Near-duplicate story collapsing across outlets.
//!
//! The dedup key is tolerant to punctuation, casing, and short stop-words.
//! Two genuinely distinct short-titled stories can collide; avoiding
//! wire-service repeats matters more here than title-collision precision.

use std::collections::{HashMap, HashSet};

use crate::ingest::types::NewsItem;

/// Normalized-title dedup key: lowercase, non-alphanumeric runs become
/// spaces, tokens of one or two characters are dropped.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let cleaned: String = lower
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|part| part.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse items sharing a dedup key, keeping the later `published_at`.
/// Output preserves first-seen order; idempotent.
pub fn dedupe(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, NewsItem> = HashMap::new();

    for item in items {
        let key = normalize_title(&item.title);
        match best.get(&key) {
            Some(existing) if item.published_at <= existing.published_at => {}
            Some(_) => {
                best.insert(key, item);
            }
            None => {
                best.insert(key.clone(), item);
                order.push(key);
            }
        }
    }

    order.into_iter().filter_map(|k| best.remove(&k)).collect()
}

/// Sort for prompt construction: preferred-source items first, then recency.
/// Stable, so dedup's first-seen order breaks remaining ties.
pub fn rank(items: &mut [NewsItem], preferred: &HashSet<String>) {
    items.sort_by(|a, b| {
        let a_pref = preferred.contains(&a.source);
        let b_pref = preferred.contains(&b.source);
        b_pref
            .cmp(&a_pref)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
}

// src/sources.rs
//! Source catalog: configured feeds/sites plus the built-in defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Website,
    Newsletter,
    Social,
}

/// A configured feed or site to ingest from. Created by user action or the
/// default catalog; mutated by enable/preferred toggles, never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bridge feed for non-RSS kinds (e.g. an RSS mirror of a social account).
    #[serde(default)]
    pub ingest_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub preferred: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub allow_scrape: bool,
}

fn default_enabled() -> bool {
    true
}

impl Source {
    /// A source can be ingested as a feed when it is RSS or carries a bridge feed URL.
    pub fn feed_url(&self) -> Option<&str> {
        if self.kind == SourceKind::Rss {
            return Some(self.url.as_str());
        }
        self.ingest_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// Built-in catalog shipped with the app. Users can add custom sources on top.
pub fn default_catalog() -> Vec<Source> {
    fn entry(
        id: &str,
        name: &str,
        url: &str,
        kind: SourceKind,
        category: &str,
        summary: &str,
        tags: &[&str],
    ) -> Source {
        Source {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            kind,
            category: category.to_string(),
            summary: summary.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ingest_url: None,
            enabled: true,
            preferred: false,
            custom: false,
            allow_scrape: false,
        }
    }

    vec![
        entry(
            "openai-blog",
            "OpenAI Blog",
            "https://openai.com/blog/rss",
            SourceKind::Rss,
            "Labs",
            "Research releases, product launches, and safety updates from OpenAI.",
            &["models", "research", "product"],
        ),
        entry(
            "google-ai-blog",
            "Google AI Blog",
            "https://blog.google/technology/ai/rss/",
            SourceKind::Rss,
            "Labs",
            "Updates on Google research, Gemini, and applied AI.",
            &["research", "product", "enterprise"],
        ),
        entry(
            "deepmind-blog",
            "DeepMind Blog",
            "https://deepmind.google/blog/rss.xml",
            SourceKind::Rss,
            "Labs",
            "Research highlights and frontier model advances from DeepMind.",
            &["research", "frontier"],
        ),
        entry(
            "anthropic-news",
            "Anthropic News",
            "https://www.anthropic.com/news.rss",
            SourceKind::Rss,
            "Labs",
            "Anthropic announcements, research, and safety notes.",
            &["safety", "models"],
        ),
        entry(
            "the-verge-ai",
            "The Verge AI",
            "https://www.theverge.com/rss/ai/index.xml",
            SourceKind::Rss,
            "Media",
            "Mainstream coverage of AI products and industry moves.",
            &["product", "industry"],
        ),
        entry(
            "techcrunch-ai",
            "TechCrunch AI",
            "https://techcrunch.com/tag/artificial-intelligence/feed/",
            SourceKind::Rss,
            "Media",
            "Startup funding, launches, and AI industry reporting.",
            &["startups", "funding"],
        ),
        Source {
            allow_scrape: true,
            ..entry(
                "hacker-news-ai",
                "Hacker News",
                "https://news.ycombinator.com",
                SourceKind::Website,
                "Community",
                "Front-page discussion of new models, tools, and papers.",
                &["community", "tools"],
            )
        },
        entry(
            "import-ai",
            "Import AI",
            "https://importai.substack.com",
            SourceKind::Newsletter,
            "Newsletters",
            "Weekly analysis of AI research and policy.",
            &["policy", "research"],
        ),
    ]
}

// src/engine.rs
//! Pipeline orchestration: collect → dedupe/rank → (widen once) → prompt →
//! stream generation → parse → archive. Emits ordered events over a channel
//! and honors cooperative cancellation between phases and mid-stream.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::brief::{parse_brief, BriefSections};
use crate::config::{clamp_window, BriefSettings};
use crate::dedup;
use crate::generate::{GenerateError, GenerationConfig, GenerationSink, TextGenerator};
use crate::history::{BriefArchive, HealthLog};
use crate::ingest::types::{NewsItem, SourceFetchResult};
use crate::ingest::{self, FeedClient};
use crate::prompt::build_prompt;
use crate::sources::Source;
use crate::store::KvStore;

const WIDENED_WINDOW_HOURS: u32 = 48;
const MIN_PROMPT_ITEMS: usize = 3;

/// Everything the `done` event carries back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefOutcome {
    pub text: String,
    pub brief: BriefSections,
    pub source_results: Vec<SourceFetchResult>,
    pub coverage_summary: String,
    pub expanded_window_used: bool,
    pub dedup_count: usize,
}

#[derive(Debug, Clone)]
pub enum BriefEvent {
    Status { message: String },
    Delta { text: String },
    Error { message: String, status: u16 },
    Done(Box<BriefOutcome>),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad configuration, surfaced before any network call. Not retried.
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

struct ChannelSink<'a>(&'a mpsc::UnboundedSender<BriefEvent>);

impl GenerationSink for ChannelSink<'_> {
    fn status(&self, message: &str) {
        let _ = self.0.send(BriefEvent::Status {
            message: message.to_string(),
        });
    }

    fn delta(&self, text: &str) {
        let _ = self.0.send(BriefEvent::Delta {
            text: text.to_string(),
        });
    }
}

pub struct Pipeline {
    feeds: Arc<dyn FeedClient>,
    generator: Arc<dyn TextGenerator>,
    health: HealthLog,
    archive: BriefArchive,
}

impl Pipeline {
    pub fn new(
        feeds: Arc<dyn FeedClient>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            feeds,
            generator,
            health: HealthLog::new(store.clone()),
            archive: BriefArchive::new(store),
        }
    }

    /// Run one generation cycle. Returns `Ok(None)` when canceled; items
    /// already fetched are kept (health is recorded), no brief is produced.
    pub async fn run(
        &self,
        sources: &[Source],
        settings: &BriefSettings,
        generation: &GenerationConfig,
        events: &mpsc::UnboundedSender<BriefEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Result<Option<BriefOutcome>, EngineError> {
        let active: Vec<Source> = sources.iter().filter(|s| s.enabled).cloned().collect();
        if active.is_empty() {
            return Err(EngineError::Config(
                "Enable at least one source to build a brief.".to_string(),
            ));
        }
        if generation.model.trim().is_empty() {
            return Err(EngineError::Config("Missing model in settings.".to_string()));
        }
        if generation.api_key.trim().is_empty() {
            return Err(EngineError::Config(
                "Missing OpenAI API key. Add it in the UI or set OPENAI_API_KEY.".to_string(),
            ));
        }

        let status = |message: &str| {
            let _ = events.send(BriefEvent::Status {
                message: message.to_string(),
            });
        };

        status("Collecting sources...");
        let mut window = clamp_window(settings.time_window_hours);
        let mut outcome = ingest::fetch_recent(self.feeds.as_ref(), &active, window).await;
        self.health.record(&outcome.results);

        let preferred_names: Vec<String> = active
            .iter()
            .filter(|s| s.preferred)
            .map(|s| s.name.clone())
            .collect();
        let preferred_set: HashSet<String> = preferred_names.iter().cloned().collect();

        let (mut prompt_items, mut dedup_count) = prepare_items(&outcome.items, &preferred_set);

        // Single bounded adaptive pass: a thin result set widens the window
        // once to 48h and the second pass replaces the first entirely.
        let mut expanded_window_used = false;
        if prompt_items.len() < MIN_PROMPT_ITEMS && window < WIDENED_WINDOW_HOURS {
            expanded_window_used = true;
            status("Low volume, expanding window...");
            window = WIDENED_WINDOW_HOURS;
            outcome = ingest::fetch_recent(self.feeds.as_ref(), &active, window).await;
            self.health.record(&outcome.results);
            let widened = prepare_items(&outcome.items, &preferred_set);
            prompt_items = widened.0;
            dedup_count = widened.1;
        }

        let contributing = outcome
            .results
            .iter()
            .filter(|r| r.status.contributed())
            .count();
        let coverage_summary = format!("{contributing} of {} sources contributed", active.len());

        if *cancel.borrow() {
            status("Generation canceled.");
            return Ok(None);
        }

        let prompt = build_prompt(
            &prompt_items,
            settings.tone,
            &settings.focus_topics,
            &preferred_names,
            window,
        );

        status("Generating brief...");
        let sink = ChannelSink(events);
        let text = match self
            .generator
            .generate(&prompt, generation, &sink, cancel.clone())
            .await
        {
            Ok(text) => text,
            Err(GenerateError::Canceled) => {
                status("Generation canceled.");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        if *cancel.borrow() {
            status("Generation canceled.");
            return Ok(None);
        }

        status("Parsing response...");
        let brief = parse_brief(&text);
        self.archive
            .push(brief.clone(), outcome.results.clone(), coverage_summary.clone());

        let done = BriefOutcome {
            text,
            brief,
            source_results: outcome.results,
            coverage_summary,
            expanded_window_used,
            dedup_count,
        };
        status("Brief ready.");
        let _ = events.send(BriefEvent::Done(Box::new(done.clone())));
        Ok(Some(done))
    }
}

/// Placeholders out, dedupe, preferred-first rank. Returns the ranked set
/// and how many duplicates were removed.
fn prepare_items(items: &[NewsItem], preferred: &HashSet<String>) -> (Vec<NewsItem>, usize) {
    let non_placeholder: Vec<NewsItem> = items
        .iter()
        .filter(|i| !i.is_placeholder)
        .cloned()
        .collect();
    let before = non_placeholder.len();
    let mut deduped = dedup::dedupe(non_placeholder);
    let removed = before - deduped.len();
    dedup::rank(&mut deduped, preferred);
    (deduped, removed)
}

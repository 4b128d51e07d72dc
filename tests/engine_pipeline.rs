// tests/engine_pipeline.rs
//! End-to-end pipeline orchestration with fixture transport and a stub model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};

use ai_brief::config::BriefSettings;
use ai_brief::engine::{BriefEvent, EngineError, Pipeline};
use ai_brief::generate::{
    GenerateError, GenerationConfig, GenerationSink, TextGenerator,
};
use ai_brief::history::BriefArchive;
use ai_brief::ingest::types::{FetchError, RawFeedEntry};
use ai_brief::ingest::FeedClient;
use ai_brief::sources::{Source, SourceKind};
use ai_brief::store::{KvStore, MemoryStore};

const DOCUMENT: &str = "Headline:\nStub headline\n\nSummary:\nStub summary.\n";

struct FixtureClient {
    feeds: HashMap<String, Vec<RawFeedEntry>>,
}

#[async_trait]
impl FeedClient for FixtureClient {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<RawFeedEntry>, FetchError> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or(FetchError::HttpStatus(503))
    }

    async fn fetch_page(&self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::ScrapeStatus(404))
    }
}

#[derive(Default)]
struct StubGenerator {
    prompts: Mutex<Vec<String>>,
    fail_with: Mutex<Option<GenerateError>>,
}

impl StubGenerator {
    fn failing(err: GenerateError) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_with: Mutex::new(Some(err)),
        }
    }

    fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
        sink: &dyn GenerationSink,
        _cancel: watch::Receiver<bool>,
    ) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        sink.status("Streaming response...");
        for line in DOCUMENT.split_inclusive('\n') {
            sink.delta(line);
        }
        Ok(DOCUMENT.to_string())
    }
}

fn entry(title: &str, published_at: DateTime<Utc>) -> RawFeedEntry {
    RawFeedEntry {
        title: title.to_string(),
        link: format!("https://example.com/{}", title.replace(' ', "-")),
        published_at: Some(published_at),
        summary: String::new(),
        author: String::new(),
        image_url: String::new(),
    }
}

fn rss_source(id: &str, url: &str) -> Source {
    Source {
        id: id.to_string(),
        name: format!("{id} name"),
        url: url.to_string(),
        kind: SourceKind::Rss,
        category: String::new(),
        summary: String::new(),
        tags: Vec::new(),
        ingest_url: None,
        enabled: true,
        preferred: false,
        custom: false,
        allow_scrape: false,
    }
}

fn settings(window: u32) -> BriefSettings {
    BriefSettings {
        time_window_hours: window,
        ..BriefSettings::default()
    }
}

fn generation() -> GenerationConfig {
    GenerationConfig::new("test-key", "gpt-4o-mini")
}

struct Harness {
    pipeline: Pipeline,
    generator: Arc<StubGenerator>,
    store: Arc<dyn KvStore>,
}

fn harness(feeds: HashMap<String, Vec<RawFeedEntry>>, generator: StubGenerator) -> Harness {
    let generator = Arc::new(generator);
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        Arc::new(FixtureClient { feeds }),
        generator.clone(),
        store.clone(),
    );
    Harness {
        pipeline,
        generator,
        store,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<BriefEvent>) -> Vec<BriefEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[BriefEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BriefEvent::Status { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn thin_results_widen_the_window_once_and_replace_the_first_pass() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Daybefore story number three", now - Duration::hours(30)),
            entry("Daybefore story number four", now - Duration::hours(36)),
        ],
    )]);
    let h = harness(feeds, StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap()
        .expect("brief produced");

    assert!(outcome.expanded_window_used);
    // Both fetch passes hit the aggregator; the prompt is built from the 48h pass.
    let prompt = h.generator.last_prompt();
    assert!(prompt.contains("the last 48 hours"));
    assert!(prompt.contains("Daybefore story number four"));
    assert!(prompt.contains("Fresh story number one"));

    let events = drain(&mut rx);
    assert!(statuses(&events).contains(&"Low volume, expanding window...".to_string()));
    assert!(matches!(events.last(), Some(BriefEvent::Done(_))));
}

#[tokio::test]
async fn enough_items_skip_the_widening_pass() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Fresh story number three", now - Duration::hours(3)),
        ],
    )]);
    let h = harness(feeds, StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.expanded_window_used);
    assert!(h.generator.last_prompt().contains("the last 24 hours"));
    let events = drain(&mut rx);
    assert!(!statuses(&events).contains(&"Low volume, expanding window...".to_string()));
}

#[tokio::test]
async fn already_wide_windows_do_not_widen_again() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![entry("Lone fresh story here", now - Duration::hours(1))],
    )]);
    let h = harness(feeds, StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(48), &generation(), &tx, cancel_rx)
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.expanded_window_used);
    assert_eq!(h.generator.prompt_count(), 1);
}

#[tokio::test]
async fn placeholders_stay_out_of_the_prompt_and_dedup_is_counted() {
    let now = Utc::now();
    let feeds = HashMap::from([
        (
            "https://a.example/feed".to_string(),
            vec![
                entry("OpenAI launches GPT-5", now - Duration::hours(1)),
                entry("Second distinct story title", now - Duration::hours(2)),
                entry("Third distinct story title", now - Duration::hours(3)),
            ],
        ),
        (
            "https://b.example/feed".to_string(),
            vec![entry("OpenAI launches GPT-5!", now - Duration::hours(4))],
        ),
    ]);
    let h = harness(feeds, StubGenerator::default());
    let mut queued = rss_source("q", "https://q.example");
    queued.kind = SourceKind::Newsletter;
    let sources = vec![
        rss_source("a", "https://a.example/feed"),
        rss_source("b", "https://b.example/feed"),
        queued,
    ];

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.dedup_count, 1);
    assert_eq!(outcome.coverage_summary, "2 of 3 sources contributed");
    let prompt = h.generator.last_prompt();
    assert!(!prompt.contains("Source queued:"));
    // the earlier duplicate lost to the fresher one
    assert!(prompt.contains("OpenAI launches GPT-5 |"));
    assert!(!prompt.contains("OpenAI launches GPT-5! |"));
}

#[tokio::test]
async fn disabled_sources_are_not_fetched_and_zero_enabled_is_terminal() {
    let h = harness(HashMap::new(), StubGenerator::default());
    let mut disabled = rss_source("a", "https://a.example/feed");
    disabled.enabled = false;

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let err = h
        .pipeline
        .run(&[disabled], &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert_eq!(h.generator.prompt_count(), 0);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_fetch() {
    let h = harness(HashMap::new(), StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let mut no_key = generation();
    no_key.api_key = String::new();
    let err = h
        .pipeline
        .run(&sources, &settings(24), &no_key, &tx, cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));

    let (_cancel_tx2, cancel_rx2) = watch::channel(false);
    let mut no_model = generation();
    no_model.model = String::new();
    let err = h
        .pipeline
        .run(&sources, &settings(24), &no_model, &tx, cancel_rx2)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));

    // no phase narration happened before the terminal error
    assert!(statuses(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn cancellation_before_generation_produces_no_brief() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Fresh story number three", now - Duration::hours(3)),
        ],
    )]);
    let h = harness(feeds, StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(h.generator.prompt_count(), 0);

    let events = drain(&mut rx);
    assert!(statuses(&events).contains(&"Generation canceled.".to_string()));
    assert!(!events.iter().any(|e| matches!(e, BriefEvent::Done(_))));
}

#[tokio::test]
async fn canceled_generation_is_not_an_error() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Fresh story number three", now - Duration::hours(3)),
        ],
    )]);
    let h = harness(feeds, StubGenerator::failing(GenerateError::Canceled));
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn generation_failures_propagate_and_skip_the_archive() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Fresh story number three", now - Duration::hours(3)),
        ],
    )]);
    let h = harness(
        feeds,
        StubGenerator::failing(GenerateError::Api("provider said no".into())),
    );
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let err = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Generate(_)));
    assert!(BriefArchive::new(h.store.clone()).list().is_empty());
}

#[tokio::test]
async fn successful_runs_parse_archive_and_emit_done() {
    let now = Utc::now();
    let feeds = HashMap::from([(
        "https://a.example/feed".to_string(),
        vec![
            entry("Fresh story number one", now - Duration::hours(1)),
            entry("Fresh story number two", now - Duration::hours(2)),
            entry("Fresh story number three", now - Duration::hours(3)),
        ],
    )]);
    let h = harness(feeds, StubGenerator::default());
    let sources = vec![rss_source("a", "https://a.example/feed")];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = h
        .pipeline
        .run(&sources, &settings(24), &generation(), &tx, cancel_rx)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.brief.headline, "Stub headline");
    assert_eq!(outcome.brief.summary, "Stub summary.");
    assert_eq!(outcome.text, DOCUMENT);

    let archived = BriefArchive::new(h.store.clone()).list();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].brief.headline, "Stub headline");

    let events = drain(&mut rx);
    let narration = statuses(&events);
    assert_eq!(narration.first().map(String::as_str), Some("Collecting sources..."));
    assert!(narration.contains(&"Parsing response...".to_string()));
    assert!(narration.contains(&"Brief ready.".to_string()));
    assert!(events.iter().any(|e| matches!(e, BriefEvent::Delta { .. })));
    match events.last() {
        Some(BriefEvent::Done(done)) => {
            assert_eq!(done.coverage_summary, "1 of 1 sources contributed");
        }
        other => panic!("expected done event, got {other:?}"),
    }
}

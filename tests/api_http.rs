// tests/api_http.rs
//! Router-level tests: health, catalog, request validation, the SSE relay,
//! and the source-check probe.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::IntoResponse;
use http::{header, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use ai_brief::api::{create_router, AppState};
use ai_brief::config::AppConfig;
use ai_brief::engine::Pipeline;
use ai_brief::generate::OpenAiGenerator;
use ai_brief::ingest::types::{FetchError, RawFeedEntry};
use ai_brief::ingest::FeedClient;
use ai_brief::store::MemoryStore;

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

fn router_with(feeds: HashMap<String, Vec<RawFeedEntry>>, config: AppConfig) -> Router {
    let feeds: Arc<dyn FeedClient> = Arc::new(FixtureClient { feeds });
    let pipeline = Arc::new(Pipeline::new(
        feeds.clone(),
        Arc::new(OpenAiGenerator::new()),
        Arc::new(MemoryStore::new()),
    ));
    create_router(AppState {
        pipeline,
        config: Arc::new(config),
        feeds,
    })
}

fn fresh_feed(count: usize) -> Vec<RawFeedEntry> {
    (0..count)
        .map(|i| RawFeedEntry {
            title: format!("Fixture story number {i}"),
            link: format!("https://a.example/{i}"),
            published_at: Some(Utc::now() - Duration::hours(i as i64 + 1)),
            summary: String::new(),
            author: String::new(),
            image_url: String::new(),
        })
        .collect()
}

fn source_json(id: &str, url: &str) -> Value {
    json!({ "id": id, "name": format!("{id} name"), "url": url, "kind": "rss" })
}

async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_answers_ok() {
    let router = router_with(HashMap::new(), AppConfig::default());
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn default_catalog_is_served() {
    let router = router_with(HashMap::new(), AppConfig::default());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/sources")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let sources: Value = serde_json::from_slice(&bytes).unwrap();
    let list = sources.as_array().unwrap();
    assert!(!list.is_empty());
    assert_eq!(list[0]["id"], "openai-blog");
}

#[tokio::test]
async fn brief_requests_are_validated_before_any_stream() {
    let router = router_with(HashMap::new(), AppConfig::default());

    // missing model
    let (status, body) = post_json(
        router.clone(),
        "/api/brief",
        json!({ "sources": [source_json("a", "https://a.example/feed")], "settings": { "apiKey": "k" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Missing model in settings.");

    // no sources
    let (status, _) = post_json(
        router.clone(),
        "/api/brief",
        json!({ "sources": [], "settings": { "apiKey": "k", "model": "gpt-4o-mini" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // all sources disabled
    let mut disabled = source_json("a", "https://a.example/feed");
    disabled["enabled"] = json!(false);
    let (status, _) = post_json(
        router.clone(),
        "/api/brief",
        json!({ "sources": [disabled], "settings": { "apiKey": "k", "model": "gpt-4o-mini" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // missing key everywhere
    let (status, body) = post_json(
        router,
        "/api/brief",
        json!({ "sources": [source_json("a", "https://a.example/feed")], "settings": { "model": "gpt-4o-mini" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn brief_endpoint_relays_the_pipeline_as_sse() {
    // stub generation endpoint the real client streams from
    const STREAM: &str = concat!(
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Headline:\\nRelayed headline\"}\n\n",
        "data: {\"type\":\"response.completed\"}\n\n",
    );
    async fn stub() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "text/event-stream")], STREAM)
    }
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/v1/responses", post(stub)))
            .await
            .unwrap();
    });

    let config = AppConfig {
        endpoint: format!("http://{addr}/v1/responses"),
        ..AppConfig::default()
    };
    let feeds = HashMap::from([("https://a.example/feed".to_string(), fresh_feed(3))]);
    let router = router_with(feeds, config);

    let (status, body) = post_json(
        router,
        "/api/brief",
        json!({
            "sources": [source_json("a", "https://a.example/feed")],
            "settings": { "apiKey": "k", "model": "gpt-4o-mini" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("event: status"));
    assert!(text.contains("Collecting sources..."));
    assert!(text.contains("event: delta"));
    assert!(text.contains("event: done"));
    assert!(text.contains("Relayed headline"));
    assert!(text.contains("\"coverageSummary\":\"1 of 1 sources contributed\""));
}

#[tokio::test]
async fn source_check_probes_each_source() {
    let feeds = HashMap::from([("https://a.example/feed".to_string(), fresh_feed(5))]);
    let router = router_with(feeds, AppConfig::default());

    let (status, body) = post_json(
        router,
        "/api/source-check",
        json!({
            "sources": [
                source_json("a", "https://a.example/feed"),
                source_json("broken", "https://broken.example/feed")
            ],
            "hours": 24
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["count"], 5);
    assert_eq!(results[0]["sampleTitles"].as_array().unwrap().len(), 3);
    assert!(results[0]["responseTimeMs"].is_number());
    assert_eq!(results[1]["status"], "failed");
}

#[tokio::test]
async fn source_check_rejects_an_empty_source_list() {
    let router = router_with(HashMap::new(), AppConfig::default());
    let (status, _) = post_json(router, "/api/source-check", json!({ "sources": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// src/api.rs
//! HTTP surface: brief generation relayed as server-sent events, a
//! per-source probe, and the default catalog.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;

use crate::config::{AppConfig, BriefSettings};
use crate::engine::{BriefEvent, EngineError, Pipeline};
use crate::generate::GenerationConfig;
use crate::ingest::types::SourceFetchResult;
use crate::ingest::{self, FeedClient};
use crate::sources::{default_catalog, Source};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<AppConfig>,
    pub feeds: Arc<dyn FeedClient>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sources", get(list_sources))
        .route("/api/brief", post(generate_brief))
        .route("/api/source-check", post(source_check))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

async fn list_sources() -> Json<Vec<Source>> {
    Json(default_catalog())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BriefRequest {
    sources: Vec<Source>,
    settings: BriefSettings,
}

// Dropping the SSE stream (client disconnect) flips the cancel flag so the
// in-flight generation stops instead of streaming into the void.
struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

fn to_sse_event(event: BriefEvent) -> Event {
    let (name, payload) = match event {
        BriefEvent::Status { message } => ("status", json!({ "message": message })),
        BriefEvent::Delta { text } => ("delta", json!({ "text": text })),
        BriefEvent::Error { message, status } => {
            ("error", json!({ "message": message, "status": status }))
        }
        BriefEvent::Done(outcome) => (
            "done",
            serde_json::to_value(&*outcome).unwrap_or_else(|_| json!({})),
        ),
    };
    Event::default().event(name).data(payload.to_string())
}

async fn generate_brief(
    State(state): State<AppState>,
    Json(request): Json<BriefRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorBody>)> {
    // Configuration problems are terminal and surface before any stream starts.
    let model = request
        .settings
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| state.config.model.clone())
        .unwrap_or_default();
    if model.trim().is_empty() {
        return Err(bad_request("Missing model in settings."));
    }
    if request.sources.is_empty() {
        return Err(bad_request("No sources provided."));
    }
    if !request.sources.iter().any(|s| s.enabled) {
        return Err(bad_request("Enable at least one source to build a brief."));
    }
    let api_key = request
        .settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| state.config.api_key.clone())
        .unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(bad_request(
            "Missing OpenAI API key. Add it in the UI or set OPENAI_API_KEY.",
        ));
    }

    let generation = GenerationConfig {
        endpoint: state.config.endpoint.clone(),
        api_key,
        model,
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let pipeline = state.pipeline.clone();
    let sources = request.sources;
    let settings = request.settings;
    let task_events = events_tx.clone();
    tokio::spawn(async move {
        let run = pipeline
            .run(&sources, &settings, &generation, &task_events, cancel_rx)
            .await;
        if let Err(err) = run {
            let status = match &err {
                EngineError::Config(_) => 400,
                EngineError::Generate(_) => 500,
            };
            let _ = task_events.send(BriefEvent::Error {
                message: err.to_string(),
                status,
            });
        }
    });
    drop(events_tx);

    let guard = CancelOnDrop(cancel_tx);
    let stream = futures_util::stream::unfold((events_rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(to_sse_event(event)), (rx, guard)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SourceCheckRequest {
    sources: Vec<Source>,
    hours: u32,
}

impl Default for SourceCheckRequest {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            hours: 72,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceCheckResult {
    #[serde(flatten)]
    result: SourceFetchResult,
    response_time_ms: u128,
    sample_titles: Vec<String>,
}

async fn source_check(
    State(state): State<AppState>,
    Json(request): Json<SourceCheckRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorBody>)> {
    if request.sources.is_empty() {
        return Err(bad_request("No sources provided."));
    }
    let hours = if request.hours == 0 { 72 } else { request.hours };

    let mut results = Vec::with_capacity(request.sources.len());
    for source in &request.sources {
        let start = Instant::now();
        let outcome =
            ingest::fetch_recent(state.feeds.as_ref(), std::slice::from_ref(source), hours).await;
        let response_time_ms = start.elapsed().as_millis();
        let sample_titles = outcome
            .items
            .iter()
            .filter(|i| !i.is_placeholder)
            .take(3)
            .map(|i| i.title.clone())
            .collect();
        if let Some(result) = outcome.results.into_iter().next() {
            results.push(SourceCheckResult {
                result,
                response_time_ms,
                sample_titles,
            });
        }
    }

    Ok(Json(json!({ "results": results })))
}

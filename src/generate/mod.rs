// src/generate/mod.rs
//! Streaming client for the text-generation endpoint.
//!
//! Request → stream → assemble, with exactly one automatic retry on timeout
//! and a non-streaming fallback when a stream completes without producing
//! any text. Delta delivery is sequential; callbacks fire in arrival order.

mod stream;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;

use crate::generate::stream::{extract_output_text, parse_stream_line, StreamSignal};
use crate::prompt::SYSTEM_PROMPT;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";

const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(900);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("generate_requests_total", "Generation attempts sent.");
        describe_counter!(
            "generate_timeout_retries_total",
            "Automatic retries after a request timeout."
        );
        describe_counter!(
            "generate_stream_fallback_total",
            "Streams that produced no text and fell back to a full request."
        );
    });
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl GenerationConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("The AI endpoint is invalid.")]
    InvalidEndpoint,
    #[error("AI API error: {0}")]
    Api(String),
    #[error("AI API error: HTTP {status}. {body}")]
    Http { status: u16, body: String },
    #[error("The AI response was empty.")]
    EmptyResponse,
    #[error("The AI request timed out.")]
    Timeout,
    #[error("Generation canceled.")]
    Canceled,
    #[error(transparent)]
    Transport(reqwest::Error),
}

fn classify(err: reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::Timeout
    } else {
        GenerateError::Transport(err)
    }
}

/// Receives pipeline narration and incremental text. Implementations must be
/// cheap; both callbacks run on the stream's delivery task.
pub trait GenerationSink: Send + Sync {
    fn status(&self, message: &str);
    fn delta(&self, text: &str);
}

/// Seam between the pipeline and the provider, so tests can swap in a stub.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        sink: &dyn GenerationSink,
        cancel: watch::Receiver<bool>,
    ) -> Result<String, GenerateError>;
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    input: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn request_body<'a>(config: &'a GenerationConfig, prompt: &'a str, stream: bool) -> RequestBody<'a> {
    RequestBody {
        model: &config.model,
        input: vec![
            Message {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            Message {
                role: "user",
                content: prompt,
            },
        ],
        temperature: temperature_for_model(&config.model),
        stream,
    }
}

// gpt-5 family rejects explicit temperature; everything else gets a low one.
fn temperature_for_model(model: &str) -> Option<f32> {
    if model.trim().to_ascii_lowercase().starts_with("gpt-5") {
        None
    } else {
        Some(0.4)
    }
}

fn api_error(status: u16, body: &str) -> GenerateError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match envelope.error.code {
            Some(code) if !code.is_empty() => format!("({code}) {}", envelope.error.message),
            _ => envelope.error.message,
        };
        return GenerateError::Api(message);
    }
    GenerateError::Http {
        status,
        body: body.trim().to_string(),
    }
}

/// Short stable id for trace lines; raw prompt text never hits the logs.
fn prompt_fingerprint(text: &str) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Client for `/v1/responses`-shaped endpoints.
pub struct OpenAiGenerator {
    http: reqwest::Client,
}

impl Default for OpenAiGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiGenerator {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// The timeout covers the whole request including body streaming; a
    /// stalled stream surfaces as `GenerateError::Timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-brief/0.1 (+github.com/ai-brief/ai-brief)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { http }
    }

    async fn stream_response(
        &self,
        endpoint: reqwest::Url,
        config: &GenerationConfig,
        prompt: &str,
        sink: &dyn GenerationSink,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<String, GenerateError> {
        if *cancel.borrow() {
            return Err(GenerateError::Canceled);
        }

        let resp = self
            .http
            .post(endpoint.clone())
            .bearer_auth(&config.api_key)
            .json(&request_body(config, prompt, true))
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        sink.status("Streaming response...");
        let mut byte_stream = resp.bytes_stream();
        let mut pending = String::new();
        let mut assembled = String::new();

        'read: loop {
            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped sender means the caller has gone away too.
                    if changed.is_err() || *cancel.borrow() {
                        return Err(GenerateError::Canceled);
                    }
                }
                chunk = byte_stream.next() => {
                    let Some(chunk) = chunk else { break 'read };
                    let bytes = chunk.map_err(classify)?;
                    pending.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(pos) = pending.find('\n') {
                        let line: String = pending.drain(..=pos).collect();
                        match parse_stream_line(&line) {
                            StreamSignal::Delta(delta) => {
                                assembled.push_str(&delta);
                                sink.delta(&delta);
                            }
                            StreamSignal::Completed | StreamSignal::Done => break 'read,
                            StreamSignal::Error(message) => {
                                return Err(GenerateError::Api(message))
                            }
                            StreamSignal::Ignore => {}
                        }
                    }
                }
            }
        }

        // A final line without a trailing newline still counts.
        match parse_stream_line(&pending) {
            StreamSignal::Delta(delta) => {
                assembled.push_str(&delta);
                sink.delta(&delta);
            }
            StreamSignal::Error(message) => return Err(GenerateError::Api(message)),
            _ => {}
        }

        if assembled.trim().is_empty() {
            counter!("generate_stream_fallback_total").increment(1);
            sink.status("No stream data, retrying without streaming...");
            let fallback = self.non_streaming(endpoint, config, prompt, sink).await?;
            if fallback.trim().is_empty() {
                return Err(GenerateError::EmptyResponse);
            }
            return Ok(fallback);
        }
        Ok(assembled)
    }

    async fn non_streaming(
        &self,
        endpoint: reqwest::Url,
        config: &GenerationConfig,
        prompt: &str,
        sink: &dyn GenerationSink,
    ) -> Result<String, GenerateError> {
        sink.status("Waiting for full response...");
        let resp = self
            .http
            .post(endpoint)
            .bearer_auth(&config.api_key)
            .json(&request_body(config, prompt, false))
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }
        let json: Value = resp.json().await.map_err(classify)?;
        Ok(extract_output_text(&json))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        sink: &dyn GenerationSink,
        cancel: watch::Receiver<bool>,
    ) -> Result<String, GenerateError> {
        ensure_metrics_described();
        let endpoint =
            reqwest::Url::parse(config.endpoint.trim()).map_err(|_| GenerateError::InvalidEndpoint)?;

        tracing::info!(
            prompt_id = %prompt_fingerprint(prompt),
            model = %config.model,
            "generation request"
        );

        for attempt in 1..=MAX_ATTEMPTS {
            sink.status("Connecting to model...");
            counter!("generate_requests_total").increment(1);
            match self
                .stream_response(endpoint.clone(), config, prompt, sink, cancel.clone())
                .await
            {
                Ok(text) => return Ok(text),
                Err(GenerateError::Timeout) if attempt < MAX_ATTEMPTS => {
                    counter!("generate_timeout_retries_total").increment(1);
                    sink.status("Timeout hit, retrying...");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(GenerateError::EmptyResponse)
    }
}

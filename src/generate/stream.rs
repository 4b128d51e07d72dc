// src/generate/stream.rs
//! Server-sent-event line and payload parsing for the generation stream.

use serde_json::Value;

/// What one stream line means for the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamSignal {
    /// Incremental output text.
    Delta(String),
    /// `response.completed`, stream ended successfully.
    Completed,
    /// Literal `[DONE]` terminator.
    Done,
    /// `response.error` with the provider's message.
    Error(String),
    /// Comments, `event:` framing, keep-alives, unknown payloads.
    Ignore,
}

/// Parse a single line of the event stream. `data:`-prefixed payloads are
/// unwrapped; bare JSON lines are tolerated as payloads too.
pub(crate) fn parse_stream_line(line: &str) -> StreamSignal {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("event:") {
        return StreamSignal::Ignore;
    }
    let payload = trimmed.strip_prefix("data:").unwrap_or(trimmed).trim();
    if payload.is_empty() {
        return StreamSignal::Ignore;
    }
    if payload == "[DONE]" {
        return StreamSignal::Done;
    }
    let Ok(json) = serde_json::from_str::<Value>(payload) else {
        return StreamSignal::Ignore;
    };
    parse_stream_payload(&json)
}

fn parse_stream_payload(json: &Value) -> StreamSignal {
    match json.get("type").and_then(Value::as_str) {
        Some("response.output_text.delta") => {
            // The delta shows up as a bare string, a nested {text} object,
            // or a top-level text field, depending on provider version.
            let delta = json
                .get("delta")
                .and_then(Value::as_str)
                .or_else(|| {
                    json.get("delta")
                        .and_then(|d| d.get("text"))
                        .and_then(Value::as_str)
                })
                .or_else(|| json.get("text").and_then(Value::as_str));
            match delta {
                Some(text) if !text.is_empty() => StreamSignal::Delta(text.to_string()),
                _ => StreamSignal::Ignore,
            }
        }
        Some("response.completed") => StreamSignal::Completed,
        Some("response.error") => {
            let message = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("AI stream error.");
            StreamSignal::Error(message.to_string())
        }
        _ => StreamSignal::Ignore,
    }
}

/// Extract the document text from a non-streaming response body: either a
/// top-level `output_text` string or the concatenation of every
/// `output[].content[].text` block.
pub(crate) fn extract_output_text(json: &Value) -> String {
    if let Some(text) = json.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }
    let mut segments = String::new();
    if let Some(output) = json.get("output").and_then(Value::as_array) {
        for item in output {
            if let Some(content) = item.get("content").and_then(Value::as_array) {
                for block in content {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        segments.push_str(text);
                    }
                }
            }
        }
    }
    segments
}

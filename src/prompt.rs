// src/prompt.rs
//! Instruction-document builder for the generation call.
//!
//! The headings and labels emitted here are the wire protocol between this
//! module and the brief parser: any change to heading text must be mirrored
//! in `brief`.

use serde::{Deserialize, Serialize};

use crate::ingest::types::NewsItem;

pub const SYSTEM_PROMPT: &str = "You are an expert AI news editor.";

const MAX_PROMPT_ITEMS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Executive,
    #[default]
    Practical,
    Builder,
}

impl Tone {
    pub fn descriptor(self) -> &'static str {
        match self {
            Tone::Executive => "executive, concise, outcomes-focused",
            Tone::Practical => "practical, clear, with actionable takeaways",
            Tone::Builder => "builder-focused, with experiments and prompts",
        }
    }
}

/// Deterministic prompt construction. Items are assumed already deduped and
/// ranked; only the first 20 are rendered.
pub fn build_prompt(
    items: &[NewsItem],
    tone: Tone,
    focus_topics: &str,
    preferred_sources: &[String],
    window_hours: u32,
) -> String {
    let news_lines = items
        .iter()
        .take(MAX_PROMPT_ITEMS)
        .map(|item| format!("- {} | {} | {}", item.title, item.source, item.url))
        .collect::<Vec<_>>()
        .join("\n");

    let topics = focus_topics.trim();
    let topics_line = if topics.is_empty() {
        "None provided."
    } else {
        topics
    };
    let preferred_line = if preferred_sources.is_empty() {
        "None".to_string()
    } else {
        preferred_sources.join(", ")
    };
    let window_line = if window_hours == 0 {
        "24 hours".to_string()
    } else {
        format!("{window_hours} hours")
    };
    let items_block = if news_lines.is_empty() {
        "- No items available"
    } else {
        news_lines.as_str()
    };

    format!(
        r#"Create "The AI Brief" news brief. Tone: {tone}.
Focus on the last {window_line} and avoid hype. Use the items below.
Focus topics: {topics_line}
Preferred sources: {preferred_line}

Output format (use these exact headings and labels):
Headline:
<1 sentence>

Summary:
<3-5 sentences, readable paragraph>

Other Stories:
- Theme: <theme name>
  - Story: <1 sentence>
    Source: <source name>
    URL: <full link>
(Provide 3-4 themes.)

Deep Dives:
- Story: <1-2 sentences>
  Source: <source name>
  URL: <full link>
(Provide 2-3 items.)

Prompt Studio:
1) Task: <short task name>
   Prompt: <1-2 sentences, general daily utility prompt>
   Best For: <who/what it's best for>
   Input Format: <what the user should paste>
   Output Format: <what the model should return>
(Provide 2-3 prompts.)

Tomorrow's Radar:
- <2-3 full-sentence, concrete watch items tied to the provided sources>
(Do NOT include Source/URL lines here. Each bullet should be a single sentence. Avoid generic language. Each item must reference a specific company, product, model, or policy mentioned in the sources and be distinct from Other Stories and Deep Dives.)

Critical constraints:
- Do not ask the user for more sources or items.
- Do not include placeholders, caveats, or meta-commentary about missing data.
- If sources are limited, generalize carefully while staying grounded in the provided items.
- Avoid duplicate sentences across sections; each item should be unique.
- Ensure that each distinct source listed above is referenced at least once in Other Stories or Deep Dives so the brief reflects the full set of provided news.
- When you mention a source, use the exact source name from the list and base the sentence on the associated title and URL so it is grounded.

{items_block}"#,
        tone = tone.descriptor(),
    )
}

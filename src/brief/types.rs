// src/brief/types.rs
use serde::{Deserialize, Serialize};

/// Parsed brief. Every field defaults to empty, so consumers never see a null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BriefSections {
    pub headline: String,
    pub summary: String,
    pub other_stories: Vec<SignalGroup>,
    pub deep_dives: Vec<DeepDive>,
    pub prompt_studio: Vec<PromptIdea>,
    pub tools_and_launches: Vec<DeepDive>,
    pub quick_links: Vec<DeepDive>,
    pub watchlist: Vec<String>,
}

/// A themed group of short story items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGroup {
    pub theme: String,
    pub items: Vec<SignalItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalItem {
    pub story: String,
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepDive {
    pub story: String,
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptIdea {
    pub task: String,
    pub prompt: String,
    pub best_for: String,
    pub input_format: String,
    pub output_format: String,
}

impl PromptIdea {
    /// An idea is worth emitting once any of its fields carries text.
    pub fn has_content(&self) -> bool {
        !self.task.is_empty()
            || !self.prompt.is_empty()
            || !self.best_for.is_empty()
            || !self.input_format.is_empty()
            || !self.output_format.is_empty()
    }
}

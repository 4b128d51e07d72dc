// src/config.rs
//! Runtime configuration: TOML file with environment overrides.
//!
//! Resolution order for the file: $BRIEF_CONFIG_PATH, then
//! config/brief.toml, then built-in defaults. Environment variables win
//! over whatever the file said.

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::generate::DEFAULT_ENDPOINT;
use crate::prompt::Tone;

pub const DEFAULT_CONFIG_PATH: &str = "config/brief.toml";
pub const ENV_CONFIG_PATH: &str = "BRIEF_CONFIG_PATH";

pub const MIN_WINDOW_HOURS: u32 = 6;
pub const MAX_WINDOW_HOURS: u32 = 72;

/// Clamp a requested lookback window to the supported range.
pub fn clamp_window(hours: u32) -> u32 {
    hours.clamp(MIN_WINDOW_HOURS, MAX_WINDOW_HOURS)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub data_dir: PathBuf,
    pub time_window_hours: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: None,
            data_dir: PathBuf::from("data"),
            time_window_hours: 24,
        }
    }
}

impl AppConfig {
    /// Load config using env var + fallbacks:
    /// 1) $BRIEF_CONFIG_PATH (must exist when set)
    /// 2) config/brief.toml
    /// 3) defaults
    pub fn load() -> Result<Self> {
        let mut config = if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("BRIEF_CONFIG_PATH points to non-existent path"));
            }
            Self::from_path(&path)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::from_path(&default)?
            } else {
                Self::default()
            }
        };

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(model) = env::var("BRIEF_MODEL") {
            if !model.trim().is_empty() {
                config.model = Some(model.trim().to_string());
            }
        }
        if let Ok(addr) = env::var("BRIEF_BIND_ADDR") {
            if !addr.trim().is_empty() {
                config.bind_addr = addr.trim().to_string();
            }
        }
        if let Ok(endpoint) = env::var("BRIEF_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(dir) = env::var("BRIEF_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }

        config.time_window_hours = clamp_window(config.time_window_hours);
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Per-request settings from the client. Generation fields left unset fall
/// back to the server config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BriefSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub tone: Tone,
    pub focus_topics: String,
    pub time_window_hours: u32,
}

impl Default for BriefSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            tone: Tone::default(),
            focus_topics: String::new(),
            time_window_hours: 24,
        }
    }
}

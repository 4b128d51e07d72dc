// src/history.rs
//! Append-only logs persisted through the key-value boundary: per-source
//! fetch health and the brief archive.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::brief::BriefSections;
use crate::ingest::types::{FetchStatus, SourceFetchResult};
use crate::store::KvStore;

const SOURCE_HEALTH_KEY: &str = "sources.health";
const ARCHIVE_KEY: &str = "brief.archive";
const MAX_SNAPSHOTS: usize = 5;
const MAX_ARCHIVE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Success,
    Empty,
    Failed,
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatusSnapshot {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: SnapshotKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SourceStatusSnapshot {
    fn from_result(result: &SourceFetchResult) -> Self {
        let (kind, count, message) = match &result.status {
            FetchStatus::Success { count } => (SnapshotKind::Success, Some(*count), None),
            FetchStatus::Empty => (SnapshotKind::Empty, None, None),
            FetchStatus::Failed { message } => {
                (SnapshotKind::Failed, None, Some(message.clone()))
            }
            FetchStatus::Queued => (SnapshotKind::Queued, None, None),
        };
        Self {
            id: Uuid::new_v4(),
            date: result.fetched_at,
            kind,
            count,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub source_id: String,
    pub last_fetched: DateTime<Utc>,
    pub history: Vec<SourceStatusSnapshot>,
}

/// Rolling per-source fetch history, newest first, capped per source.
#[derive(Clone)]
pub struct HealthLog {
    store: Arc<dyn KvStore>,
}

impl HealthLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> HashMap<String, SourceHealth> {
        self.store
            .get(SOURCE_HEALTH_KEY)
            .and_then(|bytes| serde_json::from_slice::<Vec<SourceHealth>>(&bytes).ok())
            .map(|list| {
                list.into_iter()
                    .map(|h| (h.source_id.clone(), h))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn record(&self, results: &[SourceFetchResult]) {
        let mut health = self.load();
        for result in results {
            let snapshot = SourceStatusSnapshot::from_result(result);
            let entry = health
                .entry(result.source_id.clone())
                .or_insert_with(|| SourceHealth {
                    source_id: result.source_id.clone(),
                    last_fetched: result.fetched_at,
                    history: Vec::new(),
                });
            entry.last_fetched = result.fetched_at;
            entry.history.insert(0, snapshot);
            entry.history.truncate(MAX_SNAPSHOTS);
        }
        let list: Vec<&SourceHealth> = health.values().collect();
        match serde_json::to_vec(&list) {
            Ok(bytes) => {
                if let Err(err) = self.store.set(SOURCE_HEALTH_KEY, &bytes) {
                    tracing::warn!(error = %err, "failed to persist source health");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode source health"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedBrief {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub brief: BriefSections,
    pub source_results: Vec<SourceFetchResult>,
    pub coverage_summary: String,
}

/// Bounded archive of generated briefs, newest first. A regeneration with
/// the same headline inside a minute is treated as a double-tap and skipped.
#[derive(Clone)]
pub struct BriefArchive {
    store: Arc<dyn KvStore>,
}

impl BriefArchive {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<ArchivedBrief> {
        self.store
            .get(ARCHIVE_KEY)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    pub fn push(
        &self,
        brief: BriefSections,
        source_results: Vec<SourceFetchResult>,
        coverage_summary: String,
    ) {
        let entry = ArchivedBrief {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            brief,
            source_results,
            coverage_summary,
        };
        let mut archive = self.list();
        if let Some(first) = archive.first() {
            let age = entry.created_at.signed_duration_since(first.created_at);
            if age.num_seconds().abs() < 60 && first.brief.headline == entry.brief.headline {
                return;
            }
        }
        archive.insert(0, entry);
        archive.truncate(MAX_ARCHIVE);
        match serde_json::to_vec(&archive) {
            Ok(bytes) => {
                if let Err(err) = self.store.set(ARCHIVE_KEY, &bytes) {
                    tracing::warn!(error = %err, "failed to persist brief archive");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode brief archive"),
        }
    }
}

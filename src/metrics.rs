//! Search and question-click counters for the FAQ page.
//!
//! Counts live in memory behind a shared handle and are written through to
//! a key-value store after every increment. Store failures are logged and
//! never lose the in-memory count.

use crate::config::StorageConfig;
use crate::normalize;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const MIN_SEARCH_CHARS: usize = 3;
const QUESTION_PREVIEW_CHARS: usize = 50;
const SUMMARY_LIMIT: usize = 10;

type Counts = BTreeMap<String, u64>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("store payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable string storage keyed by name, in the spirit of `localStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Search,
    Question,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopQuery {
    pub text: String,
    pub count: u64,
    pub kind: QueryKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub search_queries: Counts,
    pub question_clicks: Counts,
    pub export_date: String,
}

impl MetricsExport {
    /// `cablebus-metrics-YYYY-MM-DD.json`, dated by the export.
    pub fn file_name(&self) -> String {
        let day = self.export_date.get(..10).unwrap_or(&self.export_date);
        format!("cablebus-metrics-{day}.json")
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub top: Vec<TopQuery>,
    pub total_searches: u64,
    pub total_clicks: u64,
    pub distinct_searches: usize,
    pub distinct_questions: usize,
}

#[derive(Clone)]
pub struct Metrics {
    shared: Arc<MetricsShared>,
}

struct MetricsShared {
    inner: RwLock<MetricsData>,
    store: Box<dyn KeyValueStore>,
    keys: StorageConfig,
}

#[derive(Default)]
struct MetricsData {
    search_queries: Counts,
    question_clicks: Counts,
}

impl Metrics {
    /// Reads both counters from `store` once. Unreadable entries start empty.
    pub fn open(store: impl KeyValueStore + 'static, keys: StorageConfig) -> Self {
        let data = MetricsData {
            search_queries: load_counts(&store, &keys.search_queries_key),
            question_clicks: load_counts(&store, &keys.question_clicks_key),
        };
        Self {
            shared: Arc::new(MetricsShared {
                inner: RwLock::new(data),
                store: Box::new(store),
                keys,
            }),
        }
    }

    pub fn ephemeral() -> Self {
        Self::open(MemoryStore::new(), StorageConfig::default())
    }

    /// Counts a search. Queries shorter than three characters are ignored.
    pub fn track_search(&self, query: &str) -> bool {
        let normalized = normalize(query);
        if normalized.chars().count() < MIN_SEARCH_CHARS {
            return false;
        }
        let mut guard = self.shared.inner.write();
        *guard.search_queries.entry(normalized).or_default() += 1;
        self.persist(&guard);
        true
    }

    pub fn track_question_click(&self, question: &str) {
        let normalized = normalize(question);
        if normalized.is_empty() {
            return;
        }
        let mut guard = self.shared.inner.write();
        *guard.question_clicks.entry(normalized).or_default() += 1;
        self.persist(&guard);
    }

    pub fn search_count(&self, query: &str) -> u64 {
        let guard = self.shared.inner.read();
        guard.search_queries.get(&normalize(query)).copied().unwrap_or(0)
    }

    pub fn question_count(&self, question: &str) -> u64 {
        let guard = self.shared.inner.read();
        guard
            .question_clicks
            .get(&normalize(question))
            .copied()
            .unwrap_or(0)
    }

    /// Searches and question clicks merged and ranked by count. Ties keep
    /// searches ahead of questions, each in key order.
    pub fn top_queries(&self, limit: usize) -> Vec<TopQuery> {
        let guard = self.shared.inner.read();
        let searches = guard.search_queries.iter().map(|(text, &count)| TopQuery {
            text: text.clone(),
            count,
            kind: QueryKind::Search,
        });
        let questions = guard.question_clicks.iter().map(|(text, &count)| TopQuery {
            text: preview(text),
            count,
            kind: QueryKind::Question,
        });
        let mut rows: Vec<_> = searches.chain(questions).collect();
        drop(guard);
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows.truncate(limit);
        rows
    }

    pub fn summary(&self) -> MetricsSummary {
        let top = self.top_queries(SUMMARY_LIMIT);
        let guard = self.shared.inner.read();
        MetricsSummary {
            top,
            total_searches: guard.search_queries.values().sum(),
            total_clicks: guard.question_clicks.values().sum(),
            distinct_searches: guard.search_queries.len(),
            distinct_questions: guard.question_clicks.len(),
        }
    }

    /// Clears memory and removes both keys from the store.
    pub fn reset(&self) {
        let mut guard = self.shared.inner.write();
        *guard = MetricsData::default();
        drop(guard);
        for key in [
            &self.shared.keys.search_queries_key,
            &self.shared.keys.question_clicks_key,
        ] {
            if let Err(err) = self.shared.store.remove(key) {
                warn!(%key, error = %err, "failed to clear metrics key");
            }
        }
        debug!("metrics reset");
    }

    pub fn export(&self) -> MetricsExport {
        let guard = self.shared.inner.read();
        MetricsExport {
            search_queries: guard.search_queries.clone(),
            question_clicks: guard.question_clicks.clone(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Writes the export into `dir` and returns the file path.
    pub fn write_export(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        let export = self.export();
        let path = dir.join(export.file_name());
        fs::create_dir_all(dir)?;
        fs::write(&path, export.to_json_pretty()?)?;
        Ok(path)
    }

    fn persist(&self, data: &MetricsData) {
        let keys = &self.shared.keys;
        for (key, counts) in [
            (&keys.search_queries_key, &data.search_queries),
            (&keys.question_clicks_key, &data.question_clicks),
        ] {
            let payload = match serde_json::to_string(counts) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%key, error = %err, "failed to serialize metrics");
                    continue;
                }
            };
            if let Err(err) = self.shared.store.set(key, &payload) {
                warn!(%key, error = %err, "failed to persist metrics");
            }
        }
    }
}

fn load_counts(store: &dyn KeyValueStore, key: &str) -> Counts {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Counts::new(),
        Err(err) => {
            warn!(%key, error = %err, "failed to read metrics");
            return Counts::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(%key, error = %err, "discarding corrupt metrics");
        Counts::new()
    })
}

fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(QUESTION_PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}

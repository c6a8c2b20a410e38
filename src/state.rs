// src/state.rs
//! Persisted "last reported" values, one flat JSON object keyed by source.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::Chamber;
use crate::error::StateError;
use crate::extract::{ChamberForecast, SeatForecast};

/// Stable identifier of one monitored metric, e.g. `gcb`, `senate`, `house_AZ01`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn gcb() -> Self {
        Self::new("gcb")
    }

    pub fn chamber(chamber: Chamber) -> Self {
        Self::new(chamber.as_str())
    }

    pub fn seat(chamber: Chamber, code: &str) -> Self {
        Self(format!("{}_{}", chamber.as_str(), code))
    }

    pub fn polls() -> Self {
        Self::new("polls")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last reported value of one key. Untagged so the file stays a plain
/// `{"gcb": 2.5, "senate": {...}, "polls": "https://..."}` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Lead(f64),
    Sentinel(String),
    Chamber(ChamberForecast),
    Seat(SeatForecast),
}

impl StoredValue {
    pub fn as_lead(&self) -> Option<f64> {
        match self {
            StoredValue::Lead(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_sentinel(&self) -> Option<&str> {
        match self {
            StoredValue::Sentinel(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_chamber(&self) -> Option<&ChamberForecast> {
        match self {
            StoredValue::Chamber(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_seat(&self) -> Option<&SeatForecast> {
        match self {
            StoredValue::Seat(s) => Some(s),
            _ => None,
        }
    }
}

/// Key → last reported value. Only grows or overwrites; nothing is deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedState(BTreeMap<SourceKey, StoredValue>);

impl PersistedState {
    pub fn get(&self, key: &SourceKey) -> Option<&StoredValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: SourceKey, value: StoredValue) -> Option<StoredValue> {
        self.0.insert(key, value)
    }

    pub fn merge(&mut self, partial: PersistedState) {
        self.0.extend(partial.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SourceKey> {
        self.0.keys()
    }
}

impl FromIterator<(SourceKey, StoredValue)> for PersistedState {
    fn from_iter<I: IntoIterator<Item = (SourceKey, StoredValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Empty state if nothing has been persisted yet; `Corrupt` if the
    /// backing data exists but cannot be parsed.
    async fn read(&self) -> Result<PersistedState, StateError>;

    /// Merge `partial` into the stored state and write the result back.
    /// Not safe under concurrent writers.
    async fn update(&self, partial: PersistedState) -> Result<(), StateError>;
}

/// Single JSON file, rewritten through a sibling temp file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn read(&self) -> Result<PersistedState, StateError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PersistedState::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_slice(&raw).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn update(&self, partial: PersistedState) -> Result<(), StateError> {
        let mut state = self.read().await?;
        state.merge(partial);

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_vec_pretty(&state).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await.map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.io_err(e))?;
        tracing::debug!(path = %self.path.display(), keys = state.len(), "state flushed");
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<PersistedState>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(initial: PersistedState) -> Self {
        Self {
            inner: Mutex::new(initial),
            writes: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        self.inner.lock().clone()
    }

    /// Number of `update` calls so far.
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn read(&self) -> Result<PersistedState, StateError> {
        Ok(self.snapshot())
    }

    async fn update(&self, partial: PersistedState) -> Result<(), StateError> {
        self.inner.lock().merge(partial);
        *self.writes.lock() += 1;
        Ok(())
    }
}

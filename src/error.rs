// src/error.rs
use std::path::PathBuf;

/// Failure of a single source check. Never aborts the run; the source simply
/// produces no message until the next scheduled invocation.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("fetch {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("raw cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not persist reported value: {0}")]
    State(#[from] StateError),
}

impl CheckError {
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        Self::Malformed(what.into())
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } | Self::Status { .. } => "transport",
            Self::MissingData(_) => "missing_data",
            Self::Malformed(_) => "malformed",
            Self::Cache { .. } => "cache",
            Self::State(_) => "state",
        }
    }
}

/// Persisted state failures. `Corrupt` at run start is fatal: treating an
/// unreadable file as empty would make every metric look changed.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

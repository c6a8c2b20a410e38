// src/source.rs
//! Remote resources and their local raw-cache copies.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::CheckError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Raw body of `url`. Not retried; the next scheduled run is the retry.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CheckError>;
}

/// Plain HTTP GET over a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CheckError> {
        let transport = |source| CheckError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CheckError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

/// Pure byte-identity test used to short-circuit extraction.
pub fn has_changed(new: &[u8], cached: Option<&[u8]>) -> bool {
    cached != Some(new)
}

/// Short hex prefix of the SHA-256 digest, for log lines.
pub fn digest_prefix(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Last-seen raw bytes, one file per remote resource.
#[derive(Debug, Clone)]
pub struct RawCache {
    dir: PathBuf,
}

impl RawCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Cached bytes, `None` if nothing has been cached yet.
    pub async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, CheckError> {
        let path = self.path_for(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CheckError::Cache { path, source }),
        }
    }

    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), CheckError> {
        let path = self.path_for(name);
        let cache_err = |source| CheckError::Cache {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).await.map_err(cache_err)?;
        fs::write(&path, bytes).await.map_err(cache_err)
    }

    /// Fetch `url` and compare with the cached copy of `name`.
    ///
    /// Returns `None` when the bytes are identical. On change the new bytes
    /// replace the cached copy before they are handed back, so a crash during
    /// extraction does not replay the same change on the next run.
    pub async fn refresh(
        &self,
        fetcher: &dyn Fetcher,
        url: &str,
        name: &str,
    ) -> Result<Option<Vec<u8>>, CheckError> {
        let fresh = fetcher.fetch(url).await?;
        let cached = self.load(name).await?;
        if !has_changed(&fresh, cached.as_deref()) {
            tracing::debug!(resource = name, "raw bytes unchanged");
            return Ok(None);
        }
        self.store(name, &fresh).await?;
        tracing::info!(
            resource = name,
            bytes = fresh.len(),
            sha256 = %digest_prefix(&fresh),
            "raw snapshot changed"
        );
        Ok(Some(fresh))
    }
}

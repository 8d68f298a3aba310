//! External collaborators consulted by the tools: the semantic code index,
//! the document index, and the repository checkout.
//!
//! Each is a trait so investigations receive their backends by injection
//! and tests can substitute in-memory doubles.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crashlens_core::chunk::{DocumentHit, SemanticCodeChunk};
use crashlens_core::config::IndexConfig;
use crashlens_core::diff::normalize_repo_path;

const INDEX_TIMEOUT: Duration = Duration::from_secs(30);

/// A failure reaching or decoding a search backend. Always surfaced to the
/// model as a tool error, never as an investigation failure.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// ─── Traits ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait CodeIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: u32)
        -> Result<Vec<SemanticCodeChunk>, BackendError>;
}

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<DocumentHit>, BackendError>;
}

/// Outcome of reading a repository file. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRead {
    Content(String),
    NotFound,
    Error(String),
}

#[async_trait]
pub trait FileAccessor: Send + Sync {
    async fn read(&self, path: &str) -> FileRead;

    /// Repository-relative form of `path`, the key `save_diff` compares
    /// diff headers against.
    fn repo_path(&self, path: &str) -> String {
        normalize_repo_path(path)
    }
}

// ─── HTTP search client ───────────────────────────────────────────────────

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: u32,
}

/// `POST {endpoint}/search` with `{"query", "top_k"}`, answered by a JSON
/// list of results.
#[derive(Debug, Clone)]
struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SearchClient {
    fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(INDEX_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn search<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<T>, BackendError> {
        let mut req = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&SearchRequest { query, top_k });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

fn api_key_from(cfg: &IndexConfig) -> Option<String> {
    cfg.api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct HttpCodeIndex {
    inner: SearchClient,
}

impl HttpCodeIndex {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, BackendError> {
        Ok(Self {
            inner: SearchClient::new(endpoint, api_key)?,
        })
    }

    pub fn from_config(cfg: &IndexConfig) -> Result<Self, BackendError> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("code_index.endpoint".into()))?;
        Self::new(endpoint, api_key_from(cfg))
    }
}

#[async_trait]
impl CodeIndex for HttpCodeIndex {
    async fn search(
        &self,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<SemanticCodeChunk>, BackendError> {
        self.inner.search(query, top_k).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpDocumentIndex {
    inner: SearchClient,
}

impl HttpDocumentIndex {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, BackendError> {
        Ok(Self {
            inner: SearchClient::new(endpoint, api_key)?,
        })
    }

    pub fn from_config(cfg: &IndexConfig) -> Result<Self, BackendError> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("document_index.endpoint".into()))?;
        Self::new(endpoint, api_key_from(cfg))
    }
}

#[async_trait]
impl DocumentIndex for HttpDocumentIndex {
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<DocumentHit>, BackendError> {
        self.inner.search(query, top_k).await
    }
}

// ─── Unconfigured backends ────────────────────────────────────────────────

/// Stand-in when no code index endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct NoCodeIndex;

#[async_trait]
impl CodeIndex for NoCodeIndex {
    async fn search(&self, _: &str, _: u32) -> Result<Vec<SemanticCodeChunk>, BackendError> {
        Err(BackendError::NotConfigured(
            "code search is not configured".into(),
        ))
    }
}

/// Stand-in when no document corpus is configured.
#[derive(Debug, Clone, Default)]
pub struct NoDocumentIndex;

#[async_trait]
impl DocumentIndex for NoDocumentIndex {
    async fn search(&self, _: &str, _: u32) -> Result<Vec<DocumentHit>, BackendError> {
        Err(BackendError::NotConfigured(
            "document search is not configured".into(),
        ))
    }
}

// ─── Local checkout ───────────────────────────────────────────────────────

/// Reads files from a repository checkout on disk.
///
/// Paths are taken relative to the checkout root. Absolute paths are
/// accepted only when they already point inside the root; `..` is rejected.
#[derive(Debug, Clone)]
pub struct LocalFileAccessor {
    root: PathBuf,
}

impl LocalFileAccessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let requested = Path::new(path.trim());
        let relative = if requested.is_absolute() {
            requested
                .strip_prefix(&self.root)
                .map_err(|_| format!("path is outside the repository: {path}"))?
                .to_path_buf()
        } else {
            requested.to_path_buf()
        };
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(format!("path escapes the repository: {path}"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileAccessor for LocalFileAccessor {
    async fn read(&self, path: &str) -> FileRead {
        let full = match self.resolve(path) {
            Ok(p) => p,
            Err(reason) => return FileRead::Error(reason),
        };
        match tokio::fs::read(&full).await {
            Ok(bytes) => FileRead::Content(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileRead::NotFound,
            Err(e) => FileRead::Error(e.to_string()),
        }
    }

    fn repo_path(&self, path: &str) -> String {
        let requested = Path::new(path.trim());
        match requested.strip_prefix(&self.root) {
            Ok(relative) if requested.is_absolute() => {
                normalize_repo_path(&relative.to_string_lossy())
            }
            _ => normalize_repo_path(path),
        }
    }
}

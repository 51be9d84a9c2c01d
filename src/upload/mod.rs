//! Upload Orchestrator
//!
//! Moves plan files to remote object storage under a global
//! bounded-concurrency policy and records where each one landed.
//! Individual transfer failures are non-fatal: the file is logged and
//! left out of the uploaded-path map, and the batch keeps going.

pub mod orchestrator;
pub mod store;

use async_trait::async_trait;
use serde::Serialize;

/// Errors from the object-storage backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("object not found: {0}")]
    NotFound(String),
}

/// Remote object storage. Idempotent on overwrite, so a re-upload of
/// the same path is safe.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes at a path, returning the remote storage path.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    /// Fetch bytes back from a path.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// HTTP-backed object storage: PUT/GET against `{base_url}/{path}`.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let response = self
            .client
            .put(self.object_url(path))
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, body });
        }
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.object_url(path))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, body });
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| StorageError::Request(e.to_string()))
    }
}

/// One progress update per settled transfer. The count only grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub completed: usize,
    pub total: usize,
}

/// A transfer that failed, with enough context to retry it by hand.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub relative_path: String,
    pub error: String,
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: usize,
    pub failed: Vec<UploadFailure>,
    pub total: usize,
    pub elapsed_ms: u64,
}

impl UploadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

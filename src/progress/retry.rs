//! Per-page PNG retry client.
//!
//! One POST per failed page; the service re-renders just that page and
//! answers with a small JSON verdict. The caller removes the page from
//! the failure set only on an explicit success.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("retry request failed: {0}")]
    Request(String),

    #[error("retry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("retry rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
pub struct RetryResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Interpret the service's verdict. A 2xx body can still carry a
/// rejection.
pub fn verdict(response: RetryResponse) -> Result<(), RetryError> {
    if response.success {
        Ok(())
    } else {
        Err(RetryError::Rejected(
            response
                .error
                .unwrap_or_else(|| "page could not be re-rendered".to_string()),
        ))
    }
}

/// HTTP client for the retry endpoint.
pub struct RetryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RetryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Ask the service to re-render one page's PNG.
    pub async fn retry_png(&self, page_id: &str) -> Result<(), RetryError> {
        let url = format!("{}/pages/{page_id}/retry-png", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| RetryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(page_id = %page_id, status, "PNG retry failed");
            return Err(RetryError::Status { status, body });
        }

        let body: RetryResponse = response
            .json()
            .await
            .map_err(|e| RetryError::Request(format!("invalid retry response: {e}")))?;
        let result = verdict(body);
        if result.is_ok() {
            tracing::info!(page_id = %page_id, "PNG retry succeeded");
        }
        result
    }
}

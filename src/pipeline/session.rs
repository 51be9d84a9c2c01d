//! Streaming session against the processing service.
//!
//! One session = one POST + one long-lived response stream. The
//! transport is behind a trait so the state machine can be driven by
//! synthetic byte streams in tests. A single timeout governs the whole
//! session; the abort flag covers both user cancellation and the
//! timeout path. Aborting never rolls back uploads.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::decoder::SseDecoder;
use super::{PipelineStage, ProcessRequest, RawStageFrame, SessionEnd, SessionError, StageProgress};

/// Default whole-session timeout. Long enough to cover OCR and AI
/// analysis for a large batch.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream read failed: {0}")]
    Read(String),
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Opens the streaming channel to the processing service.
#[async_trait]
pub trait PipelineTransport: Send + Sync {
    async fn open(&self, request: &ProcessRequest) -> Result<ByteStream, TransportError>;
}

/// Production transport: POST the request, stream the response body.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PipelineTransport for HttpTransport {
    async fn open(&self, request: &ProcessRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| TransportError::Read(e.to_string()))
        })))
    }
}

/// Drives one processing session to a terminal event, transport
/// close, abort, or timeout.
pub struct PipelineSession {
    transport: Arc<dyn PipelineTransport>,
    timeout: Duration,
    abort: Arc<AtomicBool>,
}

impl PipelineSession {
    pub fn new(transport: Arc<dyn PipelineTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared abort handle. Setting it stops the read loop and
    /// suppresses further progress callbacks.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Run the session, invoking `on_event` for each accepted frame in
    /// server order. Terminal `complete` is delivered to the callback
    /// before returning; a stage `error` is returned as a fatal
    /// `SessionError::Stage` instead.
    pub async fn run<F>(
        &self,
        request: &ProcessRequest,
        mut on_event: F,
    ) -> Result<SessionEnd, SessionError>
    where
        F: FnMut(StageProgress),
    {
        match tokio::time::timeout(self.timeout, self.drive(request, &mut on_event)).await {
            Ok(result) => result,
            Err(_) => {
                self.abort.store(true, Ordering::SeqCst);
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Pipeline session timed out");
                Err(SessionError::Timeout)
            }
        }
    }

    async fn drive<F>(
        &self,
        request: &ProcessRequest,
        on_event: &mut F,
    ) -> Result<SessionEnd, SessionError>
    where
        F: FnMut(StageProgress),
    {
        let mut stream = self.transport.open(request).await?;
        let mut decoder = SseDecoder::new();
        let mut last_ordinal = 0u8;

        tracing::info!(pages = request.page_count(), "Pipeline session opened");

        while let Some(chunk) = stream.next().await {
            if self.abort.load(Ordering::SeqCst) {
                tracing::info!("Pipeline session aborted");
                return Ok(SessionEnd::Aborted);
            }
            let chunk = chunk?;
            for payload in decoder.push(&chunk)? {
                if let Some(end) =
                    self.accept(&payload, &mut last_ordinal, on_event)?
                {
                    return Ok(end);
                }
            }
        }

        // Flush a final unterminated frame, then treat the close as
        // ambiguous-but-non-fatal.
        if let Some(payload) = decoder.finish() {
            if let Some(end) = self.accept(&payload, &mut last_ordinal, on_event)? {
                return Ok(end);
            }
        }
        tracing::warn!("Pipeline stream closed without a terminal event");
        Ok(SessionEnd::Closed)
    }

    /// Parse and apply one frame payload. Returns `Some(end)` on a
    /// terminal `complete`.
    fn accept<F>(
        &self,
        payload: &str,
        last_ordinal: &mut u8,
        on_event: &mut F,
    ) -> Result<Option<SessionEnd>, SessionError>
    where
        F: FnMut(StageProgress),
    {
        let frame: RawStageFrame = match serde_json::from_str(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed pipeline frame");
                return Ok(None);
            }
        };
        let Some(progress) = frame.into_progress() else {
            tracing::warn!("Skipping frame with unknown stage");
            return Ok(None);
        };

        if progress.stage == PipelineStage::Error {
            let message = progress
                .message
                .unwrap_or_else(|| "processing failed".to_string());
            tracing::error!(error = %message, "Pipeline reported a fatal stage error");
            return Err(SessionError::Stage(message));
        }

        // Stages only move forward; a regression means the server and
        // consumer disagree, so drop the frame rather than rewind.
        let ordinal = progress.stage.ordinal();
        if ordinal < *last_ordinal {
            tracing::warn!(stage = ?progress.stage, "Dropping out-of-order stage event");
            return Ok(None);
        }
        *last_ordinal = ordinal;

        let terminal = progress.stage == PipelineStage::Complete;
        tracing::debug!(
            stage = ?progress.stage,
            current = progress.current,
            total = progress.total,
            "Pipeline stage event"
        );
        on_event(progress);

        Ok(terminal.then_some(SessionEnd::Complete))
    }
}

//! Pipeline Session
//!
//! Consumer of the processing service's streaming protocol. The
//! service receives one POST describing the uploaded disciplines and
//! answers with a newline-delimited stream of stage-progress frames
//! until a terminal `complete`/`error` frame or transport close.

pub mod decoder;
pub mod session;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A named phase of server-side processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    Upload,
    Png,
    Ocr,
    Ai,
    PngFailures,
    Complete,
    Error,
}

impl PipelineStage {
    pub fn from_wire(stage: &str) -> Option<Self> {
        match stage {
            "init" => Some(Self::Init),
            "upload" => Some(Self::Upload),
            "png" => Some(Self::Png),
            "ocr" => Some(Self::Ocr),
            "ai" => Some(Self::Ai),
            "png_failures" => Some(Self::PngFailures),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Position in the forward-only stage order. `png_failures` shares
    /// the rendering slot because it interleaves with `png` without
    /// being a phase change.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Upload => 1,
            Self::Png | Self::PngFailures => 2,
            Self::Ocr => 3,
            Self::Ai => 4,
            Self::Complete | Self::Error => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Server-assigned identity of one logical page, delivered on `init`
/// after multi-page sources are expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIdentity {
    pub id: String,
    pub page_name: String,
}

/// One decoded stage-progress event. Each event supersedes the
/// previous one; only `init` may correct the total page count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub stage: PipelineStage,
    pub current: usize,
    pub total: usize,
    /// Complete current failure set, sent with `png_failures`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_ids: Option<HashSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Page identities, sent with `init` when the server lists the
    /// pages it created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageIdentity>>,
}

/// Raw wire frame: `data:`-prefixed JSON with optional fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawStageFrame {
    pub stage: String,
    #[serde(default)]
    pub current: Option<usize>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub page_count: Option<usize>,
    #[serde(default)]
    pub page_ids: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pages: Option<Vec<PageIdentity>>,
}

impl RawStageFrame {
    /// Convert to a typed event. Returns `None` for unknown stages,
    /// which the session skips with a warning.
    pub(crate) fn into_progress(self) -> Option<StageProgress> {
        let stage = PipelineStage::from_wire(&self.stage)?;
        Some(StageProgress {
            stage,
            current: self.current.unwrap_or(0),
            total: self.total.or(self.page_count).unwrap_or(0),
            failed_ids: self.page_ids.map(|ids| ids.into_iter().collect()),
            message: self.message,
            pages: self.pages,
        })
    }
}

/// POST body sent to the processing service.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest {
    pub disciplines: Vec<DisciplineUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisciplineUpload {
    pub code: String,
    pub display_name: String,
    pub pages: Vec<PageUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageUpload {
    pub page_name: String,
    pub storage_path: String,
}

impl ProcessRequest {
    pub fn page_count(&self) -> usize {
        self.disciplines.iter().map(|d| d.pages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.page_count() == 0
    }
}

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Terminal `complete` frame received.
    Complete,
    /// Stream closed with no terminal frame: ambiguous but non-fatal,
    /// progress may be incomplete.
    Closed,
    /// Local abort (user cancel or timeout path).
    Aborted,
}

/// Fatal session outcomes.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("pipeline transport error: {0}")]
    Transport(#[from] session::TransportError),

    #[error("pipeline stage error: {0}")]
    Stage(String),

    #[error("pipeline session timed out")]
    Timeout,

    #[error("pipeline stream decode error: {0}")]
    Decode(#[from] decoder::DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wire_names_round_trip() {
        for stage in [
            PipelineStage::Init,
            PipelineStage::Upload,
            PipelineStage::Png,
            PipelineStage::Ocr,
            PipelineStage::Ai,
            PipelineStage::PngFailures,
            PipelineStage::Complete,
            PipelineStage::Error,
        ] {
            let wire = serde_json::to_value(stage).unwrap();
            let name = wire.as_str().unwrap();
            assert_eq!(PipelineStage::from_wire(name), Some(stage));
        }
        assert_eq!(PipelineStage::from_wire("warmup"), None);
    }

    #[test]
    fn test_frame_parsing_defaults() {
        let frame: RawStageFrame =
            serde_json::from_str(r#"{"stage":"png","current":3,"total":10}"#).unwrap();
        let progress = frame.into_progress().unwrap();
        assert_eq!(progress.stage, PipelineStage::Png);
        assert_eq!(progress.current, 3);
        assert_eq!(progress.total, 10);
        assert!(progress.failed_ids.is_none());
    }

    #[test]
    fn test_frame_page_count_feeds_total() {
        let frame: RawStageFrame =
            serde_json::from_str(r#"{"stage":"init","pageCount":12}"#).unwrap();
        let progress = frame.into_progress().unwrap();
        assert_eq!(progress.total, 12);
    }

    #[test]
    fn test_frame_page_ids_become_failure_set() {
        let frame: RawStageFrame = serde_json::from_str(
            r#"{"stage":"png_failures","pageIds":["p1","p2"],"message":"2 pages failed"}"#,
        )
        .unwrap();
        let progress = frame.into_progress().unwrap();
        let ids = progress.failed_ids.unwrap();
        assert!(ids.contains("p1") && ids.contains("p2"));
    }

    #[test]
    fn test_request_body_field_names() {
        let request = ProcessRequest {
            disciplines: vec![DisciplineUpload {
                code: "structural".into(),
                display_name: "Structural".into(),
                pages: vec![PageUpload {
                    page_name: "S-201.pdf".into(),
                    storage_path: "job/structural/S-201.pdf".into(),
                }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["disciplines"][0]["display_name"], "Structural");
        assert_eq!(json["disciplines"][0]["pages"][0]["page_name"], "S-201.pdf");
        assert_eq!(
            json["disciplines"][0]["pages"][0]["storage_path"],
            "job/structural/S-201.pdf"
        );
    }

    #[test]
    fn test_ordinals_are_forward() {
        assert!(PipelineStage::Init.ordinal() < PipelineStage::Upload.ordinal());
        assert_eq!(
            PipelineStage::Png.ordinal(),
            PipelineStage::PngFailures.ordinal()
        );
        assert!(PipelineStage::Ai.ordinal() < PipelineStage::Complete.ordinal());
    }
}

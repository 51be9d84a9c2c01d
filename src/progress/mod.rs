//! Progress and failure aggregation.
//!
//! A single pure reducer folds upload and pipeline events into one
//! `ProgressState` snapshot for the UI. Every transition is a function
//! of the previous state and one event, so the whole surface is
//! testable without any async machinery.

pub mod retry;

use std::collections::HashSet;

use serde::Serialize;

use crate::pipeline::{PipelineStage, StageProgress};

/// How long a finished (or ambiguously closed) session's progress
/// panel stays visible before auto-dismissing.
pub const DISMISS_DELAY_MS: u64 = 3_000;

/// Events the reducer consumes, from both halves of the operation.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// One more upload transfer settled.
    UploadAdvanced { completed: usize, total: usize },
    /// A decoded pipeline stage frame.
    Stage(StageProgress),
    /// A per-page retry round-tripped successfully.
    RetrySucceeded { page_id: String },
    /// The session ended fatally (stage error, transport failure, or
    /// timeout).
    SessionFailed { message: String, timed_out: bool },
    /// The stream closed without a terminal frame.
    StreamClosed,
}

/// A current/total pair that only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub current: usize,
    pub total: usize,
}

/// Aggregate view of one upload+processing operation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Local transfer counter, fed by the upload orchestrator. The
    /// server's `upload`-stage echo carries its own counts, but the
    /// local side settles transfers first and is authoritative, so
    /// those echoed counts are dropped rather than merged.
    pub upload: Counter,
    /// Most recent pipeline stage, if the session has started.
    pub stage: Option<PipelineStage>,
    pub pipeline: Counter,
    /// Complete set of pages whose rendering currently stands failed.
    pub failed_pages: HashSet<String>,
    /// Bumped on completion and on each successful retry; the UI
    /// refetches page data whenever it changes.
    pub refresh_token: u64,
    pub completed: bool,
    /// Stream closed without a terminal frame; totals may be short.
    pub maybe_incomplete: bool,
    pub fatal_error: Option<String>,
    pub timed_out: bool,
    /// When set, the UI hides the panel after this many milliseconds.
    pub dismiss_after_ms: Option<u64>,
}

impl ProgressState {
    pub fn has_failures(&self) -> bool {
        !self.failed_pages.is_empty()
    }
}

/// Fold one event into the state. Pure: the input state is never
/// mutated.
pub fn reduce(state: &ProgressState, event: &ProgressEvent) -> ProgressState {
    let mut next = state.clone();
    match event {
        ProgressEvent::UploadAdvanced { completed, total } => {
            // Settle order is nondeterministic; never let a stale
            // update walk the counter backwards.
            next.upload.current = next.upload.current.max(*completed);
            next.upload.total = next.upload.total.max(*total);
        }
        ProgressEvent::Stage(progress) => apply_stage(&mut next, progress),
        ProgressEvent::RetrySucceeded { page_id } => {
            if next.failed_pages.remove(page_id) {
                next.refresh_token += 1;
            }
        }
        ProgressEvent::SessionFailed { message, timed_out } => {
            next.fatal_error = Some(message.clone());
            next.timed_out = *timed_out;
        }
        ProgressEvent::StreamClosed => {
            if !next.completed && next.fatal_error.is_none() {
                next.maybe_incomplete = true;
                next.dismiss_after_ms = Some(DISMISS_DELAY_MS);
            }
        }
    }
    next
}

fn apply_stage(state: &mut ProgressState, progress: &StageProgress) {
    state.stage = Some(progress.stage);
    match progress.stage {
        PipelineStage::Init => {
            // Only init may correct the expected page total, after the
            // server expands multi-page sources.
            if progress.total > 0 {
                state.pipeline.total = progress.total;
            }
        }
        PipelineStage::Upload => {
            // Server-side echo of the upload phase; see the `upload`
            // field on `ProgressState`.
        }
        PipelineStage::Png | PipelineStage::Ocr | PipelineStage::Ai => {
            state.pipeline.current = progress.current;
            if progress.total > 0 {
                state.pipeline.total = progress.total;
            }
        }
        PipelineStage::PngFailures => {
            // Full replacement: the frame carries the complete current
            // failure set, not a delta.
            state.failed_pages = progress.failed_ids.clone().unwrap_or_default();
        }
        PipelineStage::Complete => {
            state.completed = true;
            state.pipeline.current = state.pipeline.total;
            state.refresh_token += 1;
            state.dismiss_after_ms = Some(DISMISS_DELAY_MS);
        }
        PipelineStage::Error => {
            // Fatal errors arrive as SessionFailed; an error frame
            // never reaches the reducer directly.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage: PipelineStage, current: usize, total: usize) -> ProgressEvent {
        ProgressEvent::Stage(StageProgress {
            stage,
            current,
            total,
            failed_ids: None,
            message: None,
            pages: None,
        })
    }

    fn failures(ids: &[&str]) -> ProgressEvent {
        ProgressEvent::Stage(StageProgress {
            stage: PipelineStage::PngFailures,
            current: 0,
            total: 0,
            failed_ids: Some(ids.iter().map(|s| s.to_string()).collect()),
            message: None,
            pages: None,
        })
    }

    fn fold(events: &[ProgressEvent]) -> ProgressState {
        events
            .iter()
            .fold(ProgressState::default(), |state, e| reduce(&state, e))
    }

    #[test]
    fn test_clean_run_ends_complete_with_one_refresh() {
        // Two three-page PDFs upload, then expand to ten pages.
        let state = fold(&[
            ProgressEvent::UploadAdvanced { completed: 1, total: 2 },
            ProgressEvent::UploadAdvanced { completed: 2, total: 2 },
            stage(PipelineStage::Init, 0, 10),
            stage(PipelineStage::Png, 2, 10),
            stage(PipelineStage::Png, 6, 10),
            stage(PipelineStage::Png, 10, 10),
            stage(PipelineStage::Ocr, 10, 10),
            stage(PipelineStage::Ai, 10, 10),
            stage(PipelineStage::Complete, 0, 0),
        ]);

        assert_eq!(state.upload, Counter { current: 2, total: 2 });
        assert_eq!(state.pipeline, Counter { current: 10, total: 10 });
        assert!(state.completed);
        assert!(!state.maybe_incomplete);
        assert_eq!(state.refresh_token, 1, "completion bumps the token exactly once");
        assert_eq!(state.dismiss_after_ms, Some(DISMISS_DELAY_MS));
    }

    #[test]
    fn test_upload_counter_is_monotonic() {
        let state = fold(&[
            ProgressEvent::UploadAdvanced { completed: 3, total: 5 },
            ProgressEvent::UploadAdvanced { completed: 2, total: 5 },
        ]);
        assert_eq!(state.upload.current, 3);
    }

    #[test]
    fn test_server_upload_echo_leaves_local_counter_alone() {
        let state = fold(&[
            ProgressEvent::UploadAdvanced { completed: 2, total: 2 },
            stage(PipelineStage::Upload, 1, 2),
        ]);
        assert_eq!(state.stage, Some(PipelineStage::Upload));
        assert_eq!(state.upload, Counter { current: 2, total: 2 });
        assert_eq!(state.pipeline, Counter::default());
    }

    #[test]
    fn test_init_corrects_total_once() {
        let state = fold(&[stage(PipelineStage::Init, 0, 12), stage(PipelineStage::Png, 3, 0)]);
        assert_eq!(state.pipeline.total, 12, "a zero total never clobbers init's");
        assert_eq!(state.pipeline.current, 3);
    }

    #[test]
    fn test_failure_set_is_fully_replaced() {
        let state = fold(&[failures(&["p1", "p2", "p3"]), failures(&["p2"])]);
        assert_eq!(state.failed_pages.len(), 1);
        assert!(state.failed_pages.contains("p2"));
        assert!(state.has_failures());
    }

    #[test]
    fn test_empty_failure_frame_clears_the_set() {
        let state = fold(&[failures(&["p1"]), failures(&[])]);
        assert!(!state.has_failures());
    }

    #[test]
    fn test_retry_success_removes_one_page_and_bumps_token() {
        let state = fold(&[
            failures(&["p1", "p2"]),
            ProgressEvent::RetrySucceeded { page_id: "p1".into() },
        ]);
        assert_eq!(state.failed_pages.len(), 1);
        assert!(state.failed_pages.contains("p2"));
        assert_eq!(state.refresh_token, 1);

        // Retrying a page that is not in the set changes nothing.
        let again = reduce(&state, &ProgressEvent::RetrySucceeded { page_id: "p1".into() });
        assert_eq!(again.refresh_token, 1);
    }

    #[test]
    fn test_silent_close_is_non_fatal_and_dismissed() {
        // Stream drops mid-OCR with no terminal frame.
        let state = fold(&[
            stage(PipelineStage::Init, 0, 10),
            stage(PipelineStage::Ocr, 4, 10),
            ProgressEvent::StreamClosed,
        ]);

        assert!(!state.completed);
        assert!(state.maybe_incomplete);
        assert!(state.fatal_error.is_none());
        assert_eq!(state.dismiss_after_ms, Some(DISMISS_DELAY_MS));
        assert_eq!(state.pipeline.current, 4, "partial progress is preserved");
    }

    #[test]
    fn test_close_after_complete_is_not_ambiguous() {
        let state = fold(&[stage(PipelineStage::Complete, 0, 0), ProgressEvent::StreamClosed]);
        assert!(state.completed);
        assert!(!state.maybe_incomplete);
    }

    #[test]
    fn test_session_failure_records_message_and_timeout() {
        let state = fold(&[
            stage(PipelineStage::Png, 2, 10),
            ProgressEvent::SessionFailed {
                message: "pipeline session timed out".into(),
                timed_out: true,
            },
        ]);
        assert_eq!(state.fatal_error.as_deref(), Some("pipeline session timed out"));
        assert!(state.timed_out);
        assert!(!state.completed);
    }

    #[test]
    fn test_reduce_does_not_mutate_input() {
        let before = fold(&[stage(PipelineStage::Init, 0, 5)]);
        let _ = reduce(&before, &stage(PipelineStage::Png, 5, 5));
        assert_eq!(before.pipeline.current, 0);
    }
}

//! Upload-and-processing coordinator for scanned construction plans.
//!
//! A local folder of plan PDFs is classified into discipline groups,
//! uploaded to object storage under a bounded-concurrency pool, and
//! handed to a processing service whose streaming progress (PNG
//! rendering, OCR, AI analysis) is folded into one observable state,
//! including per-page render failures and their retries.

pub mod classify;
pub mod coordinator;
pub mod pipeline;
pub mod progress;
pub mod upload;

pub use classify::plan::{build_upload_plan, collect_raw_files, UploadPlan};
pub use classify::{classify, Classification, Confidence, DisciplineCode};
pub use coordinator::{CoordinatorConfig, OperationReport, UploadCoordinator};
pub use pipeline::session::{HttpTransport, PipelineSession, PipelineTransport};
pub use pipeline::{PipelineStage, SessionEnd, SessionError, StageProgress};
pub use progress::{reduce, ProgressEvent, ProgressState};
pub use upload::orchestrator::{upload_plan, MAX_CONCURRENT_UPLOADS};
pub use upload::store::SessionStore;
pub use upload::{HttpObjectStorage, ObjectStorage, UploadReport};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the RUST_LOG env filter.
/// Default: warn for most crates, info for this one.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,planforge=info")),
        )
        .init();
}

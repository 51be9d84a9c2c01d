//! Operation coordinator.
//!
//! Runs one end-to-end operation: upload the plan with bounded
//! concurrency, hand the uploaded pages to the processing service,
//! and fold every progress signal from both phases through the
//! reducer into a single state the caller observes. Aborting stops
//! the stream read but never rolls back completed uploads.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::classify::plan::UploadPlan;
use crate::pipeline::session::{PipelineSession, PipelineTransport, DEFAULT_SESSION_TIMEOUT};
use crate::pipeline::{
    DisciplineUpload, PageUpload, PipelineStage, ProcessRequest, SessionEnd, SessionError,
};
use crate::progress::retry::{RetryClient, RetryError};
use crate::progress::{reduce, ProgressEvent, ProgressState};
use crate::upload::orchestrator::upload_plan;
use crate::upload::store::SessionStore;
use crate::upload::{ObjectStorage, UploadReport};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL of the processing service.
    pub service_base_url: String,
    /// Whole-session cap covering every pipeline stage.
    pub session_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            service_base_url: String::new(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

/// Final record of one operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub operation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub project_name: String,
    pub total_files: usize,
    pub upload: UploadReport,
    /// `None` when the pipeline never started (nothing uploaded).
    pub session_end: Option<SessionEnd>,
    pub progress: ProgressState,
}

pub struct UploadCoordinator {
    storage: Arc<dyn ObjectStorage>,
    transport: Arc<dyn PipelineTransport>,
    retry: RetryClient,
    store: Arc<SessionStore>,
    config: CoordinatorConfig,
    /// Abort handle of the currently running session, if any.
    active_abort: Mutex<Option<Arc<std::sync::atomic::AtomicBool>>>,
}

impl UploadCoordinator {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        transport: Arc<dyn PipelineTransport>,
        config: CoordinatorConfig,
    ) -> Self {
        let retry = RetryClient::new(config.service_base_url.clone());
        Self {
            storage,
            transport,
            retry,
            store: Arc::new(SessionStore::new()),
            config,
            active_abort: Mutex::new(None),
        }
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Request cancellation of the running session. Uploads already
    /// completed stay uploaded.
    pub fn abort(&self) {
        let guard = self
            .active_abort
            .lock()
            .expect("coordinator abort lock poisoned");
        if let Some(flag) = guard.as_ref() {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("Operation abort requested");
        }
    }

    /// Run the full operation, invoking `on_progress` with a fresh
    /// state snapshot after every folded event.
    pub async fn run<F>(&self, plan: &UploadPlan, mut on_progress: F) -> OperationReport
    where
        F: FnMut(&ProgressState),
    {
        let operation_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            operation_id = %operation_id,
            project = %plan.project_name,
            files = plan.total_file_count,
            "Operation started"
        );

        let state = Mutex::new(ProgressState::default());
        let fold = |event: ProgressEvent, on_progress: &mut F| {
            let mut guard = state.lock().expect("progress state lock poisoned");
            *guard = reduce(&guard, &event);
            on_progress(&guard);
        };

        // Phase 1: upload, draining progress as transfers settle.
        let (tx, mut rx) = mpsc::channel(32);
        let upload_fut = upload_plan(
            plan,
            Arc::clone(&self.storage),
            Arc::clone(&self.store),
            Some(tx),
        );
        let drain_fut = async {
            while let Some(update) = rx.recv().await {
                fold(
                    ProgressEvent::UploadAdvanced {
                        completed: update.completed,
                        total: update.total,
                    },
                    &mut on_progress,
                );
            }
        };
        let (upload_report, ()) = tokio::join!(upload_fut, drain_fut);

        // Phase 2: processing session over whatever actually uploaded.
        let request = self.build_request(plan);
        let known_pages = known_page_names(plan);
        let session_end = if request.is_empty() {
            tracing::warn!("No pages uploaded; skipping the processing session");
            None
        } else {
            let session =
                PipelineSession::new(Arc::clone(&self.transport), self.config.session_timeout);
            *self
                .active_abort
                .lock()
                .expect("coordinator abort lock poisoned") = Some(session.abort_handle());

            let result = session
                .run(&request, |progress| {
                    if progress.stage == PipelineStage::Init {
                        if let Some(pages) = &progress.pages {
                            let mapping: Vec<(String, String)> = pages
                                .iter()
                                .filter(|page| known_pages.contains(&page.page_name))
                                .map(|page| (page.id.clone(), page.page_name.clone()))
                                .collect();
                            self.store.commit_page_ids(&mapping);
                        }
                    }
                    fold(ProgressEvent::Stage(progress), &mut on_progress);
                })
                .await;

            *self
                .active_abort
                .lock()
                .expect("coordinator abort lock poisoned") = None;

            match result {
                Ok(SessionEnd::Closed) => {
                    fold(ProgressEvent::StreamClosed, &mut on_progress);
                    Some(SessionEnd::Closed)
                }
                Ok(end) => Some(end),
                Err(error) => {
                    let timed_out = matches!(error, SessionError::Timeout);
                    fold(
                        ProgressEvent::SessionFailed {
                            message: error.to_string(),
                            timed_out,
                        },
                        &mut on_progress,
                    );
                    None
                }
            }
        };

        let progress = state
            .into_inner()
            .expect("progress state lock poisoned");
        let finished_at = Utc::now();
        tracing::info!(
            operation_id = %operation_id,
            uploaded = upload_report.uploaded,
            failed_uploads = upload_report.failed.len(),
            session_end = ?session_end,
            completed = progress.completed,
            "Operation finished"
        );

        OperationReport {
            operation_id,
            started_at,
            finished_at,
            project_name: plan.project_name.clone(),
            total_files: plan.total_file_count,
            upload: upload_report,
            session_end,
            progress,
        }
    }

    /// Retry one failed page and fold the outcome into the given
    /// state. The page leaves the failure set only on an explicit
    /// success from the service.
    pub async fn retry_page(
        &self,
        page_id: &str,
        state: &ProgressState,
    ) -> Result<ProgressState, RetryError> {
        self.retry.retry_png(page_id).await?;
        Ok(reduce(
            state,
            &ProgressEvent::RetrySucceeded {
                page_id: page_id.to_string(),
            },
        ))
    }

    /// Assemble the POST body from the plan, keeping only files whose
    /// transfer actually succeeded.
    fn build_request(&self, plan: &UploadPlan) -> ProcessRequest {
        let mut disciplines = Vec::new();
        for (discipline, files) in &plan.disciplines {
            let pages: Vec<PageUpload> = files
                .iter()
                .filter_map(|file| {
                    self.store
                        .storage_path(&file.raw.relative_path)
                        .map(|storage_path| PageUpload {
                            // Relative path, not basename: two files
                            // named S-001.pdf in different subfolders
                            // must stay distinct page names.
                            page_name: file.raw.relative_path.clone(),
                            storage_path,
                        })
                })
                .collect();
            if !pages.is_empty() {
                disciplines.push(DisciplineUpload {
                    code: discipline.as_str().to_string(),
                    display_name: discipline.display_name().to_string(),
                    pages,
                });
            }
        }
        ProcessRequest { disciplines }
    }
}

/// Known page names, for validating the server's page listing before
/// re-keying cached local files. Page names sent to the service are
/// relative paths, so the set never collides on duplicate basenames.
fn known_page_names(plan: &UploadPlan) -> HashSet<String> {
    plan.files()
        .map(|file| file.raw.relative_path.clone())
        .collect()
}

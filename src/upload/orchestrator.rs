//! Bounded-concurrency transfer pool.
//!
//! Every plan file becomes one spawned transfer task; a shared
//! semaphore caps how many are in flight at once. Whichever task
//! finishes first releases its permit and the next queued transfer is
//! admitted, so no transfer is pinned to a fixed worker slot. The
//! batch resolves only when every scheduled transfer has settled.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Semaphore};

use crate::classify::plan::UploadPlan;

use super::store::SessionStore;
use super::{ObjectStorage, UploadFailure, UploadProgress, UploadReport};

/// Global cap on concurrently in-flight transfers.
pub const MAX_CONCURRENT_UPLOADS: usize = 5;

/// Upload every file in the plan, recording successes in the store.
///
/// Failures are logged and skipped; they never abort the batch. One
/// progress update is sent per settled transfer, with a count that
/// only grows.
pub async fn upload_plan(
    plan: &UploadPlan,
    storage: Arc<dyn ObjectStorage>,
    store: Arc<SessionStore>,
    progress: Option<mpsc::Sender<UploadProgress>>,
) -> UploadReport {
    let started = Instant::now();
    let total = plan.total_file_count;
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_UPLOADS));

    let mut transfers = FuturesUnordered::new();
    for (discipline, files) in &plan.disciplines {
        for file in files {
            let sem = Arc::clone(&semaphore);
            let storage = Arc::clone(&storage);
            let store = Arc::clone(&store);
            let local = file.raw.path.clone();
            let relative = file.raw.relative_path.clone();
            let remote_key = storage_key(&plan.project_name, discipline.as_str(), &file.raw);

            let task = tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("upload semaphore closed");

                let result = transfer_one(&*storage, &local, &remote_key).await;
                match result {
                    Ok(storage_path) => {
                        store.record_upload(&relative, storage_path, local);
                        None
                    }
                    Err(error) => {
                        tracing::warn!(file = %relative, error = %error, "Upload failed");
                        Some(error)
                    }
                }
            });
            // Keep the path outside the task so even a panicked
            // transfer names its file in the failure row.
            let relative = file.raw.relative_path.clone();
            transfers.push(async move { (relative, task.await) });
        }
    }

    let mut uploaded = 0;
    let mut failed = Vec::new();
    let mut settled = 0;

    while let Some((relative_path, task)) = transfers.next().await {
        match task {
            Ok(None) => uploaded += 1,
            Ok(Some(error)) => failed.push(UploadFailure {
                relative_path,
                error,
            }),
            Err(e) => {
                tracing::error!(file = %relative_path, error = %e, "Upload task panicked");
                failed.push(UploadFailure {
                    relative_path,
                    error: format!("transfer task failed: {e}"),
                });
            }
        }
        settled += 1;
        if let Some(ref sender) = progress {
            let _ = sender
                .send(UploadProgress {
                    completed: settled,
                    total,
                })
                .await;
        }
    }

    let report = UploadReport {
        uploaded,
        failed,
        total,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    tracing::info!(
        uploaded = report.uploaded,
        failed = report.failed.len(),
        total = report.total,
        elapsed_ms = report.elapsed_ms,
        "Upload batch settled"
    );
    report
}

/// Remote object key for one file. The subfolder structure below the
/// selection root is preserved under the discipline, so duplicate
/// basenames in different subfolders never collide.
fn storage_key(project: &str, discipline: &str, raw: &crate::classify::plan::RawFile) -> String {
    let subpath = raw
        .relative_path
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(&raw.file_name);
    format!("{project}/{discipline}/{subpath}")
}

async fn transfer_one(
    storage: &dyn ObjectStorage,
    local: &std::path::Path,
    remote_key: &str,
) -> Result<String, String> {
    let bytes = tokio::fs::read(local)
        .await
        .map_err(|e| format!("read failed: {e}"))?;
    storage
        .put(remote_key, bytes)
        .await
        .map_err(|e| e.to_string())
}

//! Upload plan construction.
//!
//! Turns a raw file selection into an `UploadPlan`: classified files
//! grouped by discipline, a review list, and a derived project name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::patterns::should_skip;
use super::{classify, Classification, Confidence, DisciplineCode};

/// Project name used when the selection has no top-level folder.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// A user-selected file plus its original relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFile {
    /// Absolute location on disk.
    pub path: PathBuf,
    /// Path relative to the selected folder, '/'-separated. May encode
    /// a discipline hint in its folder segments.
    pub relative_path: String,
    pub file_name: String,
}

impl RawFile {
    pub fn new(path: PathBuf, relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            path,
            relative_path,
            file_name,
        }
    }

    /// Name of the immediate containing folder within the selection,
    /// empty when the file sits at the top level.
    pub fn folder_name(&self) -> &str {
        let mut segments = self.relative_path.rsplit('/');
        segments.next();
        segments.next().unwrap_or("")
    }
}

/// A raw file plus its classification verdict.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub raw: RawFile,
    pub classification: Classification,
}

impl ClassifiedFile {
    pub fn discipline(&self) -> DisciplineCode {
        self.classification.discipline
    }
}

/// The classifier's output: what to upload and how it is grouped.
/// Built once, consumed read-only by the upload orchestrator.
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    pub project_name: String,
    pub disciplines: BTreeMap<DisciplineCode, Vec<ClassifiedFile>>,
    /// Relative paths of files flagged for manual review.
    pub files_needing_review: Vec<String>,
    /// Count of plan files, excluding skipped ones.
    pub total_file_count: usize,
}

impl UploadPlan {
    /// All plan files in discipline order.
    pub fn files(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.disciplines.values().flatten()
    }
}

/// Summary counts for logging and UI, one row per discipline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub project_name: String,
    pub total_files: usize,
    pub needs_review: usize,
    pub disciplines: Vec<(String, usize)>,
}

/// Walk a selected folder and collect candidate files with their
/// relative paths. Follows no symlinks; non-files are ignored.
///
/// Relative paths start with the selected folder's own name, the same
/// shape a browser folder picker produces, so the project name and
/// folder hints derive from what the user actually picked.
pub fn collect_raw_files(root: &Path) -> Vec<RawFile> {
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let mut relative = match path.strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => continue,
        };
        if !root_name.is_empty() {
            relative = format!("{root_name}/{relative}");
        }
        files.push(RawFile::new(path, relative));
    }
    files
}

/// Build an `UploadPlan` from a raw selection.
///
/// Skipped files (hidden, OS metadata, unsupported types) are excluded
/// entirely and do not count toward the total. The project name comes
/// from the top-level folder segment of the first file's relative path.
pub fn build_upload_plan(files: &[RawFile]) -> UploadPlan {
    let project_name = files
        .first()
        .and_then(|f| f.relative_path.split_once('/'))
        .map(|(top, _)| top.to_string())
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());

    let mut plan = UploadPlan {
        project_name,
        ..UploadPlan::default()
    };

    for raw in files {
        if should_skip(&raw.file_name) {
            tracing::debug!(file = %raw.relative_path, "Skipping non-plan file");
            continue;
        }

        let classification = classify(&raw.file_name, raw.folder_name());
        if classification.confidence == Confidence::NeedsReview {
            plan.files_needing_review.push(raw.relative_path.clone());
        }
        plan.disciplines
            .entry(classification.discipline)
            .or_default()
            .push(ClassifiedFile {
                raw: raw.clone(),
                classification,
            });
        plan.total_file_count += 1;
    }

    tracing::info!(
        project = %plan.project_name,
        files = plan.total_file_count,
        needs_review = plan.files_needing_review.len(),
        disciplines = plan.disciplines.len(),
        "Upload plan built"
    );

    plan
}

impl UploadPlan {
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            project_name: self.project_name.clone(),
            total_files: self.total_file_count,
            needs_review: self.files_needing_review.len(),
            disciplines: self
                .disciplines
                .iter()
                .map(|(code, files)| (code.as_str().to_string(), files.len()))
                .collect(),
        }
    }
}

//! Session-scoped upload store.
//!
//! Holds the two maps that outlive the upload phase: relative path →
//! remote storage path, and the local file cache. Both are written
//! only by the upload orchestrator; afterwards the pipeline session
//! and UI read them. The cache re-key from relative paths to
//! server-assigned page ids happens as one atomic map swap, so a
//! reader never observes a half-migrated cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// In-memory store for one upload+processing session.
#[derive(Debug, Default)]
pub struct SessionStore {
    /// relative path → remote storage path, populated per completed transfer.
    uploaded_paths: RwLock<HashMap<String, String>>,
    /// Local file cache: relative path (later: server page id) → file on disk.
    file_cache: RwLock<HashMap<String, PathBuf>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful transfer.
    pub fn record_upload(&self, relative_path: &str, storage_path: String, local: PathBuf) {
        self.uploaded_paths
            .write()
            .expect("upload store lock poisoned")
            .insert(relative_path.to_string(), storage_path);
        self.file_cache
            .write()
            .expect("upload store lock poisoned")
            .insert(relative_path.to_string(), local);
    }

    /// Remote storage path for one relative path, if its transfer succeeded.
    pub fn storage_path(&self, relative_path: &str) -> Option<String> {
        self.uploaded_paths
            .read()
            .expect("upload store lock poisoned")
            .get(relative_path)
            .cloned()
    }

    /// Snapshot of the full uploaded-path map.
    pub fn uploaded_paths(&self) -> HashMap<String, String> {
        self.uploaded_paths
            .read()
            .expect("upload store lock poisoned")
            .clone()
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded_paths
            .read()
            .expect("upload store lock poisoned")
            .len()
    }

    /// Look up a cached local file by its current key.
    pub fn local_file(&self, key: &str) -> Option<PathBuf> {
        self.file_cache
            .read()
            .expect("upload store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Re-key the file cache from relative paths to server page ids in
    /// one bulk commit: a fresh map is built and swapped in under a
    /// single write lock. Entries the server did not acknowledge are
    /// dropped from the cache.
    pub fn commit_page_ids(&self, pages: &[(String, String)]) {
        let mut cache = self.file_cache.write().expect("upload store lock poisoned");
        let mut rekeyed = HashMap::with_capacity(pages.len());
        for (page_id, relative_path) in pages {
            if let Some(local) = cache.get(relative_path) {
                rekeyed.insert(page_id.clone(), local.clone());
            } else {
                tracing::warn!(
                    page_id = %page_id,
                    relative_path = %relative_path,
                    "Server acknowledged a page with no cached local file"
                );
            }
        }
        *cache = rekeyed;
    }
}

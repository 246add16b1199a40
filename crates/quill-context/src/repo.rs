//! Cached repository facade.
//!
//! Generation jobs need the same three things about a repository up front
//! (metadata, directory listing, README) and then a handful of point file
//! reads. The first three are bundled into a [`RepoContext`] and cached per
//! `owner/repo`; file reads pass straight through to the accessor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quill_types::{
    CollaboratorError, FileRecord, RepoMetadata, RepoRef, Result, SharedRepository, TreeEntry,
    truncate_chars,
};

use crate::cache::RepoContextCache;

/// Everything a generation job needs to know about a repository before it
/// starts asking for files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoContext {
    pub repo: RepoRef,
    pub metadata: RepoMetadata,
    pub tree: Vec<TreeEntry>,
    pub readme: Option<String>,
}

impl RepoContext {
    /// File entries only, in listing order.
    pub fn files(&self) -> impl Iterator<Item = &TreeEntry> {
        self.tree.iter().filter(|e| e.is_file())
    }

    /// Whether the listing contains a file at `path`.
    pub fn has_file(&self, path: &str) -> bool {
        self.files().any(|e| e.path == path)
    }
}

/// Repository accessor fronted by the process-wide context cache.
#[derive(Clone)]
pub struct CachedRepository {
    accessor: SharedRepository,
    cache: Arc<RepoContextCache>,
}

impl CachedRepository {
    pub fn new(accessor: SharedRepository, cache: Arc<RepoContextCache>) -> Self {
        Self { accessor, cache }
    }

    /// Wrap an accessor with a private default-sized cache.
    pub fn uncached(accessor: SharedRepository) -> Self {
        Self::new(accessor, Arc::new(RepoContextCache::default()))
    }

    pub fn cache(&self) -> &Arc<RepoContextCache> {
        &self.cache
    }

    /// Repository context, fetched once per key and served from cache after.
    ///
    /// Metadata and tree failures are errors; a missing or unreadable README
    /// is recorded as `None`.
    pub async fn context(&self, repo: &RepoRef) -> Result<Arc<RepoContext>> {
        let key = repo.key();
        if let Some(hit) = self.cache.get(&key).await {
            debug!(repo = %key, "Repository context cache hit");
            return Ok(hit);
        }

        let metadata = self.accessor.metadata(repo).await?;
        let tree = self.accessor.tree(repo).await?;
        let readme = match self.accessor.readme(repo).await {
            Ok(readme) => readme,
            Err(e) => {
                warn!(repo = %key, error = %e, "README unavailable, continuing without it");
                None
            }
        };

        info!(
            repo = %key,
            entries = tree.len(),
            has_readme = readme.is_some(),
            "Repository context loaded"
        );

        let context = Arc::new(RepoContext {
            repo: repo.clone(),
            metadata,
            tree,
            readme,
        });
        self.cache.insert(&key, context.clone()).await;
        Ok(context)
    }

    /// Fetch one file as a [`FileRecord`], truncated to `max_chars`.
    ///
    /// Never fails: a missing file becomes `NotFound` and any other error
    /// becomes `Failed` with the reason.
    pub async fn fetch_file(&self, repo: &RepoRef, path: &str, max_chars: usize) -> FileRecord {
        match self.accessor.file_content(repo, path).await {
            Ok(content) => FileRecord::fetched(path, truncate_chars(&content, max_chars)),
            Err(CollaboratorError::NotFound(_)) => {
                debug!(repo = %repo, path = %path, "Requested file not found");
                FileRecord::not_found(path)
            }
            Err(e) => {
                warn!(repo = %repo, path = %path, error = %e, "File fetch failed");
                FileRecord::failed(path, e.to_string())
            }
        }
    }

    /// Fetch several files in order.
    pub async fn fetch_files(
        &self,
        repo: &RepoRef,
        paths: &[String],
        max_chars: usize,
    ) -> Vec<FileRecord> {
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            records.push(self.fetch_file(repo, path, max_chars).await);
        }
        records
    }
}

impl std::fmt::Debug for CachedRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRepository")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

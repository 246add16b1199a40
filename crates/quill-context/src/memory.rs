//! In-memory repository accessor.
//!
//! Backs tests and fixture-driven CLI runs where no real repository host is
//! available.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use quill_types::{
    CollaboratorError, CommitSummary, RepoMetadata, RepoRef, RepositoryAccessor, Result, TreeEntry,
};

/// A repository held entirely in memory.
///
/// The directory listing is derived from the stored files: every parent
/// directory appears once as a `dir` entry before its children.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    metadata: RepoMetadata,
    files: BTreeMap<String, String>,
    commits: Vec<CommitSummary>,
    unavailable: bool,
    metadata_calls: AtomicUsize,
    file_reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            metadata: RepoMetadata {
                full_name: full_name.into(),
                default_branch: Some("main".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// An accessor whose every call fails with `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: RepoMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn with_commit(mut self, commit: CommitSummary) -> Self {
        self.commits.push(commit);
        self
    }

    /// Number of `metadata` calls served, for cache assertions.
    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Number of `file_content` calls served.
    pub fn file_reads(&self) -> usize {
        self.file_reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            Err(CollaboratorError::unavailable("repository host unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RepositoryAccessor for MemoryRepository {
    async fn metadata(&self, _repo: &RepoRef) -> Result<RepoMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.metadata.clone())
    }

    async fn tree(&self, _repo: &RepoRef) -> Result<Vec<TreeEntry>> {
        self.check_available()?;

        let mut entries = Vec::new();
        let mut seen_dirs = std::collections::BTreeSet::new();
        for (path, content) in &self.files {
            let mut prefix = String::new();
            let mut parts = path.split('/').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_none() {
                    break;
                }
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(part);
                if seen_dirs.insert(prefix.clone()) {
                    entries.push(TreeEntry::dir(prefix.clone()));
                }
            }
            entries.push(TreeEntry::file(path.clone(), content.len() as u64));
        }
        Ok(entries)
    }

    async fn file_content(&self, _repo: &RepoRef, path: &str) -> Result<String> {
        self.file_reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(path))
    }

    async fn readme(&self, _repo: &RepoRef) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self
            .files
            .iter()
            .find(|(path, _)| {
                !path.contains('/') && path.to_ascii_lowercase().starts_with("readme")
            })
            .map(|(_, content)| content.clone()))
    }

    async fn recent_commits(&self, _repo: &RepoRef, limit: usize) -> Result<Vec<CommitSummary>> {
        self.check_available()?;
        Ok(self.commits.iter().take(limit).cloned().collect())
    }
}

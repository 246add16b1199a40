//! Repository records and the accessor interface.
//!
//! The orchestration core never touches a repository filesystem or the
//! hosting provider's API directly. Everything it knows about a repository
//! comes through [`RepositoryAccessor`] point queries.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CollaboratorError, Result};

/// An `owner/repo` pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Cache key form, `owner/repo`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoRef {
    type Err = CollaboratorError;

    /// Accepts `owner/repo` or a `https://github.com/owner/repo(.git)` link.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('/');
        let path = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .map(|rest| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
            .unwrap_or(trimmed);

        let mut parts = path.split('/').filter(|p| !p.is_empty());
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) => {
                let repo = repo.strip_suffix(".git").unwrap_or(repo);
                if repo.is_empty() {
                    return Err(CollaboratorError::InvalidRepo(s.to_string()));
                }
                Ok(Self::new(owner, repo))
            }
            _ => Err(CollaboratorError::InvalidRepo(s.to_string())),
        }
    }
}

/// Repository-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Kind of a directory-listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of the flat directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
            size: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A recent commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Read-only access to a hosted repository.
///
/// Implementations are async point queries; nothing here implies the
/// repository is cloned locally.
#[async_trait]
pub trait RepositoryAccessor: Send + Sync {
    /// Repository metadata.
    async fn metadata(&self, repo: &RepoRef) -> Result<RepoMetadata>;

    /// Flat listing of every path in the default branch.
    async fn tree(&self, repo: &RepoRef) -> Result<Vec<TreeEntry>>;

    /// Content of a single file. Missing files are `CollaboratorError::NotFound`.
    async fn file_content(&self, repo: &RepoRef, path: &str) -> Result<String>;

    /// README text, if the repository has one.
    async fn readme(&self, repo: &RepoRef) -> Result<Option<String>>;

    /// Most recent commits, newest first.
    async fn recent_commits(&self, repo: &RepoRef, limit: usize) -> Result<Vec<CommitSummary>>;
}

/// A repository accessor that can be shared across tasks.
pub type SharedRepository = Arc<dyn RepositoryAccessor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_repo() {
        let r: RepoRef = "acme/widgets".parse().unwrap();
        assert_eq!(r, RepoRef::new("acme", "widgets"));
        assert_eq!(r.key(), "acme/widgets");
    }

    #[test]
    fn test_parse_github_url() {
        let r: RepoRef = "https://github.com/acme/widgets.git".parse().unwrap();
        assert_eq!(r, RepoRef::new("acme", "widgets"));

        let r: RepoRef = "https://github.com/acme/widgets/".parse().unwrap();
        assert_eq!(r.to_string(), "acme/widgets");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("widgets".parse::<RepoRef>().is_err());
        assert!("https://github.com/acme".parse::<RepoRef>().is_err());
        assert!("".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_tree_entry_serializes_type_field() {
        let json = serde_json::to_value(TreeEntry::file("src/lib.rs", 120)).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["size"], 120);
    }
}

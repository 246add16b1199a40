//! Repository accessor over a local checkout.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use quill_types::{
    CollaboratorError, CommitSummary, RepoMetadata, RepoRef, RepositoryAccessor, Result, TreeEntry,
    language_for_path,
};

/// Directories never listed.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// README names probed at the repository root, in order.
const README_NAMES: &[&str] = &["README.md", "README", "README.rst", "README.txt", "readme.md"];

/// Serves one local directory as a repository.
///
/// The [`RepoRef`] passed to each call is ignored; the root is fixed at
/// construction. No commit history is available.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
    repo: RepoRef,
}

impl LocalRepository {
    /// Serve `root`. Fails if it is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CollaboratorError::InvalidRepo(root.display().to_string()));
        }
        let name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "repository".to_string());

        Ok(Self {
            root,
            repo: RepoRef::new("local", name),
        })
    }

    /// The reference this checkout is served under (`local/<dir-name>`).
    pub fn repo_ref(&self) -> &RepoRef {
        &self.repo
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a repository-relative path, refusing anything that escapes
    /// the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || path.trim().is_empty() {
            return Err(CollaboratorError::not_found(path));
        }
        Ok(self.root.join(relative))
    }

    fn walk(root: &Path) -> Vec<TreeEntry> {
        let mut entries: Vec<TreeEntry> = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e))
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let relative = e.path().strip_prefix(root).ok()?;
                let path = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if e.file_type().is_dir() {
                    Some(TreeEntry::dir(path))
                } else if e.file_type().is_file() {
                    let size = e.metadata().map(|m| m.len()).unwrap_or(0);
                    Some(TreeEntry::file(path, size))
                } else {
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Most common recognized language among the listed files.
fn dominant_language(tree: &[TreeEntry]) -> Option<String> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for entry in tree.iter().filter(|e| e.is_file()) {
        let lang = language_for_path(&entry.path);
        if !matches!(lang, "text" | "markdown" | "json" | "toml" | "yaml") {
            *counts.entry(lang).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(lang, _)| lang.to_string())
}

#[async_trait]
impl RepositoryAccessor for LocalRepository {
    async fn metadata(&self, _repo: &RepoRef) -> Result<RepoMetadata> {
        let tree = self.tree(&self.repo).await?;
        Ok(RepoMetadata {
            full_name: self.repo.key(),
            description: None,
            default_branch: None,
            language: dominant_language(&tree),
            topics: Vec::new(),
        })
    }

    async fn tree(&self, _repo: &RepoRef) -> Result<Vec<TreeEntry>> {
        let root = self.root.clone();
        let entries = tokio::task::spawn_blocking(move || Self::walk(&root))
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("directory walk failed: {}", e)))?;
        debug!(root = %self.root.display(), entries = entries.len(), "Listed local repository");
        Ok(entries)
    }

    async fn file_content(&self, _repo: &RepoRef, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CollaboratorError::not_found(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn readme(&self, repo: &RepoRef) -> Result<Option<String>> {
        for name in README_NAMES {
            match self.file_content(repo, name).await {
                Ok(content) => return Ok(Some(content)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn recent_commits(&self, _repo: &RepoRef, _limit: usize) -> Result<Vec<CommitSummary>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn checkout() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("README.md"), "# Demo").unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.path().join("target/debug/app"), "bin").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_tree_skips_build_and_vcs_dirs() {
        let dir = checkout();
        let local = LocalRepository::open(dir.path()).unwrap();
        let tree = local.tree(local.repo_ref()).await.unwrap();
        let paths: Vec<_> = tree.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(paths, vec!["README.md", "src", "src/lib.rs", "src/main.rs"]);
        assert!(!tree[1].is_file());
    }

    #[tokio::test]
    async fn test_metadata_and_readme() {
        let dir = checkout();
        let local = LocalRepository::open(dir.path()).unwrap();
        let r = local.repo_ref().clone();

        let metadata = local.metadata(&r).await.unwrap();
        assert_eq!(metadata.language.as_deref(), Some("rust"));
        assert!(metadata.full_name.starts_with("local/"));
        assert_eq!(local.readme(&r).await.unwrap().as_deref(), Some("# Demo"));
        assert!(local.recent_commits(&r, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_content_refuses_escape() {
        let dir = checkout();
        let local = LocalRepository::open(dir.path()).unwrap();
        let r = local.repo_ref().clone();

        assert_eq!(local.file_content(&r, "src/main.rs").await.unwrap(), "fn main() {}");
        assert!(local.file_content(&r, "../etc/passwd").await.unwrap_err().is_not_found());
        assert!(local.file_content(&r, "nope.rs").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_rejects_missing_dir() {
        assert!(LocalRepository::open("/definitely/not/here").is_err());
    }
}

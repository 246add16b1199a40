//! Fetched repository files.

use serde::{Deserialize, Serialize};

/// Outcome of fetching one repository path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum FetchStatus {
    Fetched,
    NotFound,
    Failed(String),
}

/// A repository file as seen by the generation paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: String,
    pub content: Option<String>,
    pub language: String,
    pub fetch_status: FetchStatus,
}

impl FileRecord {
    /// A successfully fetched file.
    pub fn fetched(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: language_for_path(&path).to_string(),
            path,
            content: Some(content.into()),
            fetch_status: FetchStatus::Fetched,
        }
    }

    /// A path the repository does not contain.
    pub fn not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: language_for_path(&path).to_string(),
            path,
            content: None,
            fetch_status: FetchStatus::NotFound,
        }
    }

    /// A path whose fetch failed for another reason.
    pub fn failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: language_for_path(&path).to_string(),
            path,
            content: None,
            fetch_status: FetchStatus::Failed(reason.into()),
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.fetch_status == FetchStatus::Fetched
    }
}

/// Marker appended to text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Keep at most `max_chars` characters, appending [`TRUNCATION_MARKER`] when
/// anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Best-effort language tag for a path, used for fenced excerpts in prompts.
pub fn language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name {
        "Dockerfile" => return "dockerfile",
        "Makefile" => return "makefile",
        _ => {}
    }

    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "text",
    };

    match ext.as_str() {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "md" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" | "htm" => "html",
        "css" => "css",
        "sh" | "bash" => "bash",
        "sql" => "sql",
        _ => "text",
    }
}

//! Prompt fragments shared by both generation strategies.

use quill_types::{FetchStatus, FileRecord, RepoMetadata, TreeEntry};

use crate::sanitize::escape_html;

pub const FORMATTING_RULES: &str = "FORMATTING RULES:
- Output HTML only: no markdown, no code fences, no <html>, <head> or <body> tags.
- Use <h2>/<h3> for headings, <p> for prose, <ul>/<ol> for lists, <pre><code> for code.
- Describe only what the repository actually contains. Do not invent files, commands or APIs.";

/// Directory listing, capped at `limit` entries.
pub fn tree_listing(tree: &[TreeEntry], limit: usize) -> String {
    if tree.is_empty() {
        return "(empty repository)".to_string();
    }
    let mut lines: Vec<String> = tree
        .iter()
        .take(limit)
        .map(|entry| match (entry.is_file(), entry.size) {
            (true, Some(size)) => format!("{} ({} bytes)", entry.path, size),
            (true, None) => entry.path.clone(),
            (false, _) => format!("{}/", entry.path),
        })
        .collect();
    if tree.len() > limit {
        lines.push(format!("... and {} more entries", tree.len() - limit));
    }
    lines.join("\n")
}

pub fn readme_excerpt(readme: Option<&str>, max_chars: usize) -> String {
    match readme {
        Some(text) if !text.trim().is_empty() => {
            quill_types::truncate_chars(text.trim(), max_chars)
        }
        _ => "(no README)".to_string(),
    }
}

pub fn repository_summary(metadata: &RepoMetadata) -> String {
    let mut lines = vec![format!("Repository: {}", metadata.full_name)];
    if let Some(description) = &metadata.description {
        lines.push(format!("Description: {}", description));
    }
    if let Some(language) = &metadata.language {
        lines.push(format!("Primary language: {}", language));
    }
    if !metadata.topics.is_empty() {
        lines.push(format!("Topics: {}", metadata.topics.join(", ")));
    }
    lines.join("\n")
}

/// Fetched files as prompt text. Missing and failed files stay visible so
/// the model knows not to rely on them.
pub fn render_files(files: &[FileRecord]) -> String {
    if files.is_empty() {
        return "(no files fetched)".to_string();
    }
    files
        .iter()
        .map(|file| match (&file.fetch_status, &file.content) {
            (FetchStatus::Fetched, Some(content)) => format!(
                "=== {} ({}) ===\n{}",
                file.path, file.language, content
            ),
            (FetchStatus::NotFound, _) => format!("=== {} === NOT FOUND", file.path),
            (FetchStatus::Failed(reason), _) => {
                format!("=== {} === FETCH FAILED: {}", file.path, reason)
            }
            (FetchStatus::Fetched, None) => format!("=== {} === (empty)", file.path),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Minimal document built from repository facts alone.
pub fn fallback_document(
    document_name: &str,
    template: &str,
    metadata: &RepoMetadata,
    tree: &[TreeEntry],
) -> String {
    let mut html = format!("<h1>{}</h1>\n", escape_html(document_name));

    html.push_str("<h2>Overview</h2>\n<p>");
    html.push_str(&escape_html(&metadata.full_name));
    if let Some(description) = &metadata.description {
        html.push_str(": ");
        html.push_str(&escape_html(description));
    }
    html.push_str("</p>\n");

    let mut facts = Vec::new();
    if let Some(language) = &metadata.language {
        facts.push(format!("<li>Primary language: {}</li>", escape_html(language)));
    }
    if let Some(branch) = &metadata.default_branch {
        facts.push(format!("<li>Default branch: {}</li>", escape_html(branch)));
    }
    if !metadata.topics.is_empty() {
        facts.push(format!("<li>Topics: {}</li>", escape_html(&metadata.topics.join(", "))));
    }
    if !facts.is_empty() {
        html.push_str(&format!("<ul>\n{}\n</ul>\n", facts.join("\n")));
    }

    let top_level: Vec<String> = tree
        .iter()
        .filter(|entry| !entry.path.contains('/'))
        .map(|entry| {
            let suffix = if entry.is_file() { "" } else { "/" };
            format!("<li><code>{}{}</code></li>", escape_html(&entry.path), suffix)
        })
        .collect();
    if !top_level.is_empty() {
        html.push_str(&format!(
            "<h2>Repository Layout</h2>\n<ul>\n{}\n</ul>\n",
            top_level.join("\n")
        ));
    }

    let template = template.trim();
    if !template.is_empty() {
        html.push_str("<h2>Template</h2>\n<p>");
        html.push_str(&escape_html(template).replace('\n', "<br>"));
        html.push_str("</p>\n");
    }
    html.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_listing_caps_entries() {
        let tree = vec![
            TreeEntry::dir("src"),
            TreeEntry::file("src/lib.rs", 120),
            TreeEntry::file("Cargo.toml", 40),
        ];
        assert_eq!(tree_listing(&tree, 2), "src/\nsrc/lib.rs (120 bytes)\n... and 1 more entries");
        assert_eq!(tree_listing(&[], 10), "(empty repository)");
    }

    #[test]
    fn test_render_files_marks_status() {
        let files = vec![
            FileRecord::fetched("src/main.rs", "fn main() {}"),
            FileRecord::not_found("src/gone.rs"),
            FileRecord::failed("big.bin", "too large"),
        ];
        let text = render_files(&files);
        assert!(text.contains("=== src/main.rs (rust) ===\nfn main() {}"));
        assert!(text.contains("=== src/gone.rs === NOT FOUND"));
        assert!(text.contains("FETCH FAILED: too large"));
    }

    #[test]
    fn test_readme_excerpt() {
        assert_eq!(readme_excerpt(None, 10), "(no README)");
        assert_eq!(readme_excerpt(Some("  short  "), 10), "short");
        assert!(readme_excerpt(Some("abcdefghijklmnop"), 4).starts_with("abcd"));
    }

    #[test]
    fn test_fallback_document() {
        let metadata = RepoMetadata {
            full_name: "acme/widgets".to_string(),
            description: Some("Widgets & gadgets".to_string()),
            language: Some("Rust".to_string()),
            ..Default::default()
        };
        let tree = vec![TreeEntry::dir("src"), TreeEntry::file("src/lib.rs", 1), TreeEntry::file("README.md", 1)];
        let html = fallback_document("Widget Guide", "Explain setup.\nKeep it short.", &metadata, &tree);

        assert!(html.starts_with("<h1>Widget Guide</h1>"));
        assert!(html.contains("acme/widgets: Widgets &amp; gadgets"));
        assert!(html.contains("<li><code>src/</code></li>"));
        assert!(!html.contains("src/lib.rs"));
        assert!(html.contains("Explain setup.<br>Keep it short."));
    }
}

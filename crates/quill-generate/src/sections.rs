//! Section-driven generation.
//!
//! 1. Pick the most useful files from the tree and README.
//! 2. Fetch them.
//! 3. Plan the section list.
//! 4. Generate each section in order, one call per section.
//! 5. Assemble under a single `<h1>`.
//!
//! Planning steps degrade to defaults; a failed section is skipped.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use quill_types::{FileRecord, truncate_chars};

use crate::chunked::{GenerationSession, GenerationStrategy};
use crate::error::{GenerateError, Result};
use crate::prompts::{FORMATTING_RULES, render_files};
use crate::sanitize::{escape_html, strip_wrappers};

/// Section plan used when the model does not provide one.
pub const DEFAULT_SECTIONS: [&str; 6] = [
    "Overview",
    "Architecture",
    "Key Components",
    "Setup and Installation",
    "Usage",
    "Development Workflow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionStatus {
    Pending,
    Done,
    Skipped,
}

/// Generates a document one planned section at a time.
#[derive(Debug, Clone, Default)]
pub struct SectionGenerator;

impl SectionGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Ask the model which files are worth reading. Empty on any failure.
    async fn select_files(&self, session: &GenerationSession<'_>) -> Vec<String> {
        let config = session.config();
        let prompt = format!(
            "You are preparing to document a software repository.\n\n\
             {summary}\n\n\
             DOCUMENT TEMPLATE:\n{template}\n\n\
             DIRECTORY TREE:\n{tree}\n\n\
             README (excerpt):\n{readme}\n\n\
             Choose the 5 to {max} files whose contents would best inform this document. \
             Respond with only a JSON array of paths from the tree, for example \
             [\"src/main.rs\", \"Cargo.toml\"].",
            summary = session.repository_summary(),
            template = session.job.template,
            tree = session.tree_listing(),
            readme = session.readme_excerpt(),
            max = config.max_selected_files,
        );

        let reply = session
            .complete("file-selection", prompt, config.planning_budget)
            .await;
        let Some(text) = reply else {
            return Vec::new();
        };
        let paths = parse_paths(&text, config.max_selected_files);
        if paths.is_empty() {
            warn!("File selection unparsable, continuing without files");
        }
        paths
    }

    /// Ask the model for a section plan, falling back to [`DEFAULT_SECTIONS`].
    async fn plan_sections(
        &self,
        session: &GenerationSession<'_>,
        files: &[FileRecord],
    ) -> Vec<String> {
        let config = session.config();
        let prompt = format!(
            "You are planning a document titled \"{name}\".\n\n\
             {summary}\n\n\
             DOCUMENT TEMPLATE:\n{template}\n\n\
             DIRECTORY TREE:\n{tree}\n\n\
             KEY FILES:\n{files}\n\n\
             Propose 4 to {max} section titles, in reading order. \
             Respond with only a JSON array of strings.",
            name = session.job.document_name,
            summary = session.repository_summary(),
            template = session.job.template,
            tree = session.tree_listing(),
            files = render_files(files),
            max = config.max_sections,
        );

        let reply = session
            .complete("section-planning", prompt, config.planning_budget)
            .await;
        let planned = match reply {
            Some(text) => parse_list(&text, &["sections"], config.max_sections),
            None => Vec::new(),
        };
        if planned.is_empty() {
            warn!("Section plan unavailable, using default sections");
            DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
        } else {
            planned
        }
    }

    fn section_prompt(
        &self,
        session: &GenerationSession<'_>,
        files: &[FileRecord],
        plan: &[String],
        statuses: &[SectionStatus],
        index: usize,
        written: &[String],
    ) -> String {
        let outline = plan
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(i, (title, status))| {
                let marker = match (i == index, status) {
                    (true, _) => "CURRENT",
                    (false, SectionStatus::Done) => "done",
                    (false, SectionStatus::Skipped) => "skipped",
                    (false, SectionStatus::Pending) => "pending",
                };
                format!("{}. {} [{}]", i + 1, title, marker)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let preview = if written.is_empty() {
            "(nothing written yet)".to_string()
        } else {
            truncate_chars(&written.join("\n"), session.config().preview_chars)
        };

        format!(
            "You are writing the document \"{name}\" one section at a time.\n\n\
             DOCUMENT TEMPLATE:\n{template}\n\n\
             {rules}\n\n\
             {summary}\n\n\
             REPOSITORY FILES:\n{files}\n\n\
             SECTIONS:\n{outline}\n\n\
             ALREADY WRITTEN (preview):\n{preview}\n\n\
             Write only the section \"{section}\". Start it with <h2>{section}</h2>. \
             Do not repeat material from sections already written.",
            name = session.job.document_name,
            template = session.job.template,
            rules = FORMATTING_RULES,
            summary = session.repository_summary(),
            files = render_files(files),
            outline = outline,
            preview = preview,
            section = plan[index],
        )
    }
}

#[async_trait]
impl GenerationStrategy for SectionGenerator {
    fn name(&self) -> &'static str {
        "sections"
    }

    async fn produce(&self, session: &GenerationSession<'_>) -> Result<String> {
        let paths = self.select_files(session).await;
        let files = session.fetch_files(&paths).await;
        let plan = self.plan_sections(session, &files).await;
        info!(files = files.len(), sections = plan.len(), "Section plan ready");

        let mut statuses = vec![SectionStatus::Pending; plan.len()];
        let mut written: Vec<String> = Vec::new();

        for index in 0..plan.len() {
            let prompt = self.section_prompt(session, &files, &plan, &statuses, index, &written);
            let body = session
                .complete("section", prompt, session.config().section_budget)
                .await
                .map(|text| strip_wrappers(&text))
                .filter(|body| !body.is_empty());

            match body {
                Some(body) => {
                    info!(
                        section = %plan[index],
                        index = index,
                        chars = body.len(),
                        "Section generated"
                    );
                    written.push(body);
                    statuses[index] = SectionStatus::Done;
                }
                None => {
                    warn!(section = %plan[index], index = index, "Section skipped");
                    statuses[index] = SectionStatus::Skipped;
                }
            }
        }

        if written.is_empty() {
            return Err(GenerateError::NoOutput {
                strategy: self.name(),
            });
        }

        Ok(format!(
            "<h1>{}</h1>\n{}",
            escape_html(&session.job.document_name),
            written.join("\n")
        ))
    }
}

/// Strings from a JSON array reply, in reply order, capped at `limit`.
///
/// Repeats are kept: a section plan is used exactly as the model wrote it.
fn parse_list(text: &str, wrapper_keys: &[&str], limit: usize) -> Vec<String> {
    let items: Vec<Value> = quill_llm::extract_json_array(text, wrapper_keys).unwrap_or_default();
    quill_llm::string_items(&items).into_iter().take(limit).collect()
}

/// File paths from a JSON array reply, each path once.
fn parse_paths(text: &str, limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    parse_list(text, &["files", "paths"], usize::MAX)
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .take(limit)
        .collect()
}

//! Prompt assembly for the stage loop.
//!
//! Each turn is a single flattened prompt:
//!
//! ```text
//! <system instructions with document facts filled in>
//! CONVERSATION:
//! User: ...
//! Assistant: ...
//! PREVIOUS STAGES COMPLETED: planning, reasoning
//! CURRENT STAGE TO EXECUTE: toolUsed
//! ```

use chrono::{DateTime, Utc};
use tracing::warn;

use quill_context::DocumentLookup;
use quill_types::Conversation;

use crate::catalog::ToolName;
use crate::error::ParseError;
use crate::stage::Stage;

/// Fixed instructions; `{{...}}` placeholders are filled per run.
pub const SYSTEM_TEMPLATE: &str = r#"You are a documentation agent editing one document through tools.
You cannot see or change the document except by requesting a tool.

Document id: {{DOCUMENT_ID}}
Linked repository: {{REPOLINK}}
Document last updated: {{DOCUMENT_LAST_UPDATED}}
Template: {{TEMPLATE_TITLE}}

Work in stages: planning -> reasoning -> toolUsed -> summary -> done.
- planning: restate the request and list the steps you will take.
- reasoning: decide what to do next from what you know so far.
- toolUsed: request exactly one tool call through "toolInvocation".
- summary: tell the user what you changed and why.
- done: only after summary.

Reply with exactly one JSON object and nothing else:
{"stage": "<current stage>", "thought": "<short private reasoning>", "content": "<text for the user>", "nextStage": "<stage>",
 "toolInvocation": {"tool": "<tool name>", "args": {...}, "description": "<why>"}}
"toolInvocation" is required on toolUsed turns and ignored otherwise.
Document edits are HTML fragments.

Available tools (names are case-sensitive):
{{TOOL_CATALOG}}"#;

/// Stand-in for facts the document store could not provide.
const UNKNOWN: &str = "unknown";

/// Per-run values substituted into [`SYSTEM_TEMPLATE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptFacts {
    pub document_id: String,
    pub repo_link: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub template_title: Option<String>,
}

impl PromptFacts {
    /// Collect facts for a document. Lookup failures are logged and leave
    /// the corresponding fact empty; they never abort the run.
    pub async fn gather(lookup: &DocumentLookup, document_id: &str) -> Self {
        let mut facts = PromptFacts {
            document_id: document_id.to_string(),
            ..Default::default()
        };

        match lookup.document(document_id).await {
            Ok(doc) => facts.last_updated = doc.updated_at.or(doc.created_at),
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "Document lookup failed");
                return facts;
            }
        }

        match lookup.project_for(document_id).await {
            Ok(project) => facts.repo_link = project.and_then(|p| p.repo_link),
            Err(e) => warn!(document_id = %document_id, error = %e, "Project lookup failed"),
        }

        match lookup.template_for(document_id).await {
            Ok(template) => facts.template_title = template.map(|t| t.title),
            Err(e) => warn!(document_id = %document_id, error = %e, "Template lookup failed"),
        }

        facts
    }

    /// The system instructions with every placeholder replaced.
    pub fn render_instructions(&self) -> String {
        let last_updated = self
            .last_updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| UNKNOWN.to_string());

        SYSTEM_TEMPLATE
            .replace("{{DOCUMENT_ID}}", &self.document_id)
            .replace("{{REPOLINK}}", self.repo_link.as_deref().unwrap_or("none"))
            .replace("{{DOCUMENT_LAST_UPDATED}}", &last_updated)
            .replace("{{TEMPLATE_TITLE}}", self.template_title.as_deref().unwrap_or("none"))
            .replace("{{TOOL_CATALOG}}", &ToolName::catalog_listing())
    }
}

/// Stage breadcrumb appended after the conversation.
pub fn breadcrumb(completed: &[Stage], current: Stage) -> String {
    let previous = if completed.is_empty() {
        "none".to_string()
    } else {
        completed
            .iter()
            .map(Stage::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "PREVIOUS STAGES COMPLETED: {}\nCURRENT STAGE TO EXECUTE: {}",
        previous, current
    )
}

/// Full prompt for one turn.
pub fn build_prompt(
    instructions: &str,
    conversation: &Conversation,
    completed: &[Stage],
    current: Stage,
) -> String {
    format!(
        "{}\n\nCONVERSATION:\n{}\n\n{}",
        instructions,
        conversation.render(),
        breadcrumb(completed, current)
    )
}

/// Instruction appended after an unparsable reply.
pub fn corrective_message(error: &ParseError, expected: Stage) -> String {
    let mut message = format!(
        "Your previous response could not be parsed ({}). Respond again with exactly one JSON \
         object with the fields \"stage\", \"thought\", \"content\" and \"nextStage\". \
         The current stage is \"{}\".",
        error, expected
    );
    if error.concerns_tools() {
        message.push_str(
            "\nA toolUsed response must include \
             \"toolInvocation\": {\"tool\", \"args\", \"description\"} \
             naming one of these tools exactly:\n",
        );
        message.push_str(&ToolName::catalog_listing());
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    use quill_context::MemoryDocumentStore;
    use quill_types::{DocumentRecord, ProjectRecord};

    #[test]
    fn test_breadcrumb() {
        assert_eq!(
            breadcrumb(&[], Stage::Planning),
            "PREVIOUS STAGES COMPLETED: none\nCURRENT STAGE TO EXECUTE: planning"
        );
        assert_eq!(
            breadcrumb(&[Stage::Planning, Stage::Reasoning], Stage::ToolUsed),
            "PREVIOUS STAGES COMPLETED: planning, reasoning\nCURRENT STAGE TO EXECUTE: toolUsed"
        );
    }

    #[test]
    fn test_render_fills_every_placeholder() {
        let facts = PromptFacts {
            document_id: "doc-7".to_string(),
            repo_link: Some("https://github.com/acme/widgets".to_string()),
            last_updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            template_title: Some("API Reference".to_string()),
        };
        let rendered = facts.render_instructions();

        assert!(!rendered.contains("{{"));
        assert!(rendered.contains("Document id: doc-7"));
        assert!(rendered.contains("https://github.com/acme/widgets"));
        assert!(rendered.contains("2024-03-01T12:00:00+00:00"));
        assert!(rendered.contains("Template: API Reference"));
        assert!(rendered.contains("fetchRepositoryCommitHistory"));
    }

    #[tokio::test]
    async fn test_gather_tolerates_missing_records() {
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document(DocumentRecord {
                    id: "d1".to_string(),
                    project_id: Some("p1".to_string()),
                    template_id: Some("missing".to_string()),
                    ..Default::default()
                })
                .with_project(ProjectRecord {
                    id: "p1".to_string(),
                    name: "P".to_string(),
                    repo_link: Some("acme/widgets".to_string()),
                }),
        );
        let lookup = DocumentLookup::new(store);

        let facts = PromptFacts::gather(&lookup, "d1").await;
        assert_eq!(facts.repo_link.as_deref(), Some("acme/widgets"));
        assert!(facts.template_title.is_none());

        let facts = PromptFacts::gather(&lookup, "nope").await;
        assert_eq!(facts.document_id, "nope");
        assert!(facts.repo_link.is_none());
    }

    #[test]
    fn test_corrective_message_lists_catalog_for_tool_errors() {
        let plain = corrective_message(&ParseError::NoJson, Stage::Reasoning);
        assert!(plain.starts_with("Your previous response could not be parsed"));
        assert!(!plain.contains("readDocumentContent"));

        let tools = corrective_message(&ParseError::UnknownTool("x".to_string()), Stage::ToolUsed);
        assert!(tools.contains("readDocumentContent"));
        assert!(tools.contains("\"toolUsed\""));
    }

    #[test]
    fn test_build_prompt_order() {
        let mut convo = Conversation::new();
        convo.push_user("Add an intro");
        let prompt = build_prompt("SYSTEM", &convo, &[], Stage::Planning);
        let system = prompt.find("SYSTEM").unwrap();
        let user = prompt.find("User: Add an intro").unwrap();
        let crumb = prompt.find("CURRENT STAGE TO EXECUTE: planning").unwrap();
        assert!(system < user && user < crumb);
    }
}

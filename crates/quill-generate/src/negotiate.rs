//! File-negotiation generation.
//!
//! The model decides which files it needs. Each round it answers with one
//! JSON object:
//!
//! ```text
//! {"needFiles": true,  "files": ["src/main.rs"], "reason": "..."}   → fetch, next round
//! {"needFiles": false, "content": "<h1>...</h1>..."}                  → done
//! ```
//!
//! The files fetched in a round replace the previous round's set. Earlier
//! files survive only as the request notes in the round history. After
//! `max_rounds` without content, a fallback document is built from
//! repository metadata.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use quill_types::FileRecord;

use crate::chunked::{GenerationSession, GenerationStrategy};
use crate::error::Result;
use crate::prompts::{FORMATTING_RULES, fallback_document, render_files};

/// One parsed negotiation reply.
#[derive(Debug, Clone, PartialEq)]
enum RoundReply {
    NeedFiles { files: Vec<String>, reason: String },
    Content(String),
    Invalid(&'static str),
}

/// Generates a document by letting the model request files round by round.
#[derive(Debug, Clone, Default)]
pub struct FileNegotiator;

impl FileNegotiator {
    pub fn new() -> Self {
        Self
    }

    fn round_prompt(
        &self,
        session: &GenerationSession<'_>,
        round: usize,
        history: &[String],
        files: &[FileRecord],
    ) -> String {
        let max_rounds = session.config().max_rounds;
        let mut prompt = format!(
            "You are writing the document \"{name}\" for a software repository.\n\n\
             DOCUMENT TEMPLATE:\n{template}\n\n\
             {rules}\n\n\
             {summary}\n\n\
             DIRECTORY TREE:\n{tree}\n\n\
             README (excerpt):\n{readme}\n\n",
            name = session.job.document_name,
            template = session.job.template,
            rules = FORMATTING_RULES,
            summary = session.repository_summary(),
            tree = session.tree_listing(),
            readme = session.readme_excerpt(),
        );

        if !history.is_empty() {
            prompt.push_str("PREVIOUS ROUNDS:\n");
            prompt.push_str(&history.join("\n"));
            prompt.push_str("\n\n");
        }
        if round > 1 {
            prompt.push_str("FILES FROM YOUR LAST REQUEST:\n");
            prompt.push_str(&render_files(files));
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!(
            "This is round {round} of {max_rounds}. \
             Respond with exactly one JSON object and nothing else:\n\
             - to read files first: \
             {{\"needFiles\": true, \"files\": [\"path\", ...], \"reason\": \"why\"}} \
             (at most {max_files} paths from the tree; only these files will be shown next round)\n\
             - when ready: {{\"needFiles\": false, \"content\": \"<full document HTML>\"}}",
            max_files = session.config().max_selected_files,
        ));
        prompt
    }
}

#[async_trait]
impl GenerationStrategy for FileNegotiator {
    fn name(&self) -> &'static str {
        "negotiate"
    }

    async fn produce(&self, session: &GenerationSession<'_>) -> Result<String> {
        let config = session.config();
        let mut files: Vec<FileRecord> = Vec::new();
        let mut history: Vec<String> = Vec::new();

        for round in 1..=config.max_rounds {
            let prompt = self.round_prompt(session, round, &history, &files);
            let reply = session
                .complete("negotiation", prompt, config.negotiation_budget)
                .await;
            let Some(text) = reply else {
                history.push(format!("Round {}: no response", round));
                continue;
            };

            match read_reply(&text, config.max_selected_files) {
                RoundReply::Content(content) => {
                    info!(round = round, chars = content.len(), "Negotiation produced content");
                    return Ok(content);
                }
                RoundReply::NeedFiles { files: paths, reason } => {
                    info!(round = round, requested = paths.len(), "Model requested files");
                    files = session.fetch_files(&paths).await;
                    let found = files
                        .iter()
                        .map(|f| {
                            let mark = if f.is_fetched() { "ok" } else { "missing" };
                            format!("{} ({})", f.path, mark)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    history.push(format!(
                        "Round {}: requested {}. Reason: {}",
                        round, found, reason
                    ));
                }
                RoundReply::Invalid(why) => {
                    warn!(round = round, reason = why, "Unusable negotiation reply");
                    history.push(format!(
                        "Round {}: your reply was not usable ({}); \
                         answer with the JSON object only",
                        round, why
                    ));
                }
            }
        }

        warn!(
            rounds = config.max_rounds,
            repo = %session.job.repo,
            "Negotiation produced no content, using fallback document"
        );
        Ok(fallback_document(
            &session.job.document_name,
            &session.job.template,
            &session.context.metadata,
            &session.context.tree,
        ))
    }
}

fn read_reply(text: &str, max_files: usize) -> RoundReply {
    let Some(extracted) = quill_llm::extract_json_object(text) else {
        return RoundReply::Invalid("no JSON object");
    };
    let object = extracted.object;

    let content = object
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty());

    match object.get("needFiles").and_then(Value::as_bool) {
        Some(true) => {
            let items = match object.get("files") {
                Some(Value::Array(items)) => quill_llm::string_items(items),
                _ => Vec::new(),
            };
            let mut files: Vec<String> = Vec::new();
            for item in items {
                if !files.contains(&item) {
                    files.push(item);
                }
            }
            files.truncate(max_files);
            if files.is_empty() {
                return RoundReply::Invalid("needFiles without any files");
            }
            let reason = object
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("none given")
                .to_string();
            RoundReply::NeedFiles { files, reason }
        }
        _ => match content {
            Some(content) => RoundReply::Content(content.to_string()),
            None => RoundReply::Invalid("no content"),
        },
    }
}

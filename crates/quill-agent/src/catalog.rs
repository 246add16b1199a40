//! The closed tool catalog.
//!
//! The model may only request tools listed here. Names are matched exactly
//! (case-sensitive); anything else is rejected before dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// A tool the model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolName {
    ReadDocumentContent,
    ScanDocumentContent,
    SearchDocumentContent,
    AppendDocumentContent,
    InsertDocumentContent,
    InsertAtLocationDocumentContent,
    ReplaceDocumentContent,
    RemoveDocumentContent,
    ReadDocumentSummary,
    ScanDocumentSummary,
    SearchDocumentSummary,
    AppendDocumentSummary,
    InsertDocumentSummary,
    InsertAtLocationDocumentSummary,
    ReplaceDocumentSummary,
    RemoveDocumentSummary,
    GetProjectDocumentMetadata,
    VerifyDocumentChanges,
    FetchRepositoryStructure,
    FetchRepositoryCommitHistory,
}

impl ToolName {
    pub const ALL: [ToolName; 20] = [
        ToolName::ReadDocumentContent,
        ToolName::ScanDocumentContent,
        ToolName::SearchDocumentContent,
        ToolName::AppendDocumentContent,
        ToolName::InsertDocumentContent,
        ToolName::InsertAtLocationDocumentContent,
        ToolName::ReplaceDocumentContent,
        ToolName::RemoveDocumentContent,
        ToolName::ReadDocumentSummary,
        ToolName::ScanDocumentSummary,
        ToolName::SearchDocumentSummary,
        ToolName::AppendDocumentSummary,
        ToolName::InsertDocumentSummary,
        ToolName::InsertAtLocationDocumentSummary,
        ToolName::ReplaceDocumentSummary,
        ToolName::RemoveDocumentSummary,
        ToolName::GetProjectDocumentMetadata,
        ToolName::VerifyDocumentChanges,
        ToolName::FetchRepositoryStructure,
        ToolName::FetchRepositoryCommitHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ReadDocumentContent => "readDocumentContent",
            ToolName::ScanDocumentContent => "scanDocumentContent",
            ToolName::SearchDocumentContent => "searchDocumentContent",
            ToolName::AppendDocumentContent => "appendDocumentContent",
            ToolName::InsertDocumentContent => "insertDocumentContent",
            ToolName::InsertAtLocationDocumentContent => "insertAtLocationDocumentContent",
            ToolName::ReplaceDocumentContent => "replaceDocumentContent",
            ToolName::RemoveDocumentContent => "removeDocumentContent",
            ToolName::ReadDocumentSummary => "readDocumentSummary",
            ToolName::ScanDocumentSummary => "scanDocumentSummary",
            ToolName::SearchDocumentSummary => "searchDocumentSummary",
            ToolName::AppendDocumentSummary => "appendDocumentSummary",
            ToolName::InsertDocumentSummary => "insertDocumentSummary",
            ToolName::InsertAtLocationDocumentSummary => "insertAtLocationDocumentSummary",
            ToolName::ReplaceDocumentSummary => "replaceDocumentSummary",
            ToolName::RemoveDocumentSummary => "removeDocumentSummary",
            ToolName::GetProjectDocumentMetadata => "getProjectDocumentMetadata",
            ToolName::VerifyDocumentChanges => "verifyDocumentChanges",
            ToolName::FetchRepositoryStructure => "fetchRepositoryStructure",
            ToolName::FetchRepositoryCommitHistory => "fetchRepositoryCommitHistory",
        }
    }

    /// Which document field a document tool touches, if any.
    fn field(&self) -> Option<&'static str> {
        let name = self.as_str();
        if name.ends_with("DocumentContent") {
            Some("content")
        } else if name.ends_with("DocumentSummary") {
            Some("summary")
        } else {
            None
        }
    }

    /// One-line description shown to the model.
    pub fn description(&self) -> String {
        use ToolName::*;
        let field = self.field().unwrap_or_default();
        match self {
            ReadDocumentContent | ReadDocumentSummary => {
                format!("Read the full document {field}.")
            }
            ScanDocumentContent | ScanDocumentSummary => {
                format!("Read a character range of the document {field}.")
            }
            SearchDocumentContent | SearchDocumentSummary => {
                format!("Find occurrences of a phrase in the document {field}.")
            }
            AppendDocumentContent | AppendDocumentSummary => {
                format!("Append HTML to the end of the document {field}.")
            }
            InsertDocumentContent | InsertDocumentSummary => {
                format!("Insert HTML at the start of the document {field}.")
            }
            InsertAtLocationDocumentContent | InsertAtLocationDocumentSummary => {
                format!("Insert HTML before or after an anchor phrase in the document {field}.")
            }
            ReplaceDocumentContent | ReplaceDocumentSummary => {
                format!("Replace a phrase in the document {field}.")
            }
            RemoveDocumentContent | RemoveDocumentSummary => {
                format!("Remove a phrase from the document {field}.")
            }
            GetProjectDocumentMetadata => {
                "List titles and ids of every document in the project.".to_string()
            }
            VerifyDocumentChanges => {
                "Check that earlier edits are present in the document.".to_string()
            }
            FetchRepositoryStructure => {
                "List the linked repository's files and directories.".to_string()
            }
            FetchRepositoryCommitHistory => {
                "List recent commits of the linked repository.".to_string()
            }
        }
    }

    /// Argument shape shown to the model. Not enforced here; the tool
    /// endpoint validates its own arguments.
    pub fn args_hint(&self) -> &'static str {
        use ToolName::*;
        match self {
            ReadDocumentContent | ReadDocumentSummary => "{}",
            ScanDocumentContent | ScanDocumentSummary => r#"{"start": number, "end": number}"#,
            SearchDocumentContent | SearchDocumentSummary => r#"{"query": string}"#,
            AppendDocumentContent | AppendDocumentSummary => r#"{"html": string}"#,
            InsertDocumentContent | InsertDocumentSummary => r#"{"html": string}"#,
            InsertAtLocationDocumentContent | InsertAtLocationDocumentSummary => {
                r#"{"anchor": string, "position": "before"|"after", "html": string}"#
            }
            ReplaceDocumentContent | ReplaceDocumentSummary => {
                r#"{"find": string, "replace": string, "all": boolean?}"#
            }
            RemoveDocumentContent | RemoveDocumentSummary => r#"{"find": string}"#,
            GetProjectDocumentMetadata => "{}",
            VerifyDocumentChanges => r#"{"expected": [string]}"#,
            FetchRepositoryStructure => r#"{"path": string?}"#,
            FetchRepositoryCommitHistory => r#"{"limit": number?}"#,
        }
    }

    /// The catalog rendered for a prompt, one tool per line.
    pub fn catalog_listing() -> String {
        ToolName::ALL
            .iter()
            .map(|t| format!("- {} {}: {}", t.as_str(), t.args_hint(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::UnknownTool(s.to_string()))
    }
}

/// A tool request carried on a `toolUsed` stage object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: ToolName,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub description: String,
}

impl ToolInvocation {
    pub fn new(tool: ToolName, args: Value) -> Self {
        Self {
            tool,
            args,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

//! Document, project and template records plus the store interface.
//!
//! The core only ever reads from the store. Persisting whatever a run
//! produces is the caller's job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// A project grouping documents around one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repo_link: Option<String>,
}

/// A document template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
}

/// Read-only access to the document/project store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn document(&self, id: &str) -> Result<DocumentRecord>;

    async fn project(&self, id: &str) -> Result<ProjectRecord>;

    async fn template(&self, id: &str) -> Result<TemplateRecord>;
}

/// A document store that can be shared across tasks.
pub type SharedDocumentStore = Arc<dyn DocumentStore>;

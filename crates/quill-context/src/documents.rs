//! Document store adapters.
//!
//! [`DocumentLookup`] memoizes reads for the lifetime of one invocation so
//! that prompt building can ask for the same document repeatedly without
//! hitting the store more than once per id. [`MemoryDocumentStore`] is the
//! fixture-backed store used by the CLI and tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use quill_types::{
    CollaboratorError, DocumentRecord, DocumentStore, ProjectRecord, Result, SharedDocumentStore,
    TemplateRecord,
};

// ─────────────────────────────────────────────────────────────────────────────
// Per-invocation lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Read-through memo over a [`DocumentStore`], scoped to one invocation.
///
/// Only successful reads are remembered; a failed lookup is retried on the
/// next call.
pub struct DocumentLookup {
    store: SharedDocumentStore,
    documents: Mutex<HashMap<String, DocumentRecord>>,
    projects: Mutex<HashMap<String, ProjectRecord>>,
    templates: Mutex<HashMap<String, TemplateRecord>>,
}

impl DocumentLookup {
    pub fn new(store: SharedDocumentStore) -> Self {
        Self {
            store,
            documents: Mutex::new(HashMap::new()),
            projects: Mutex::new(HashMap::new()),
            templates: Mutex::new(HashMap::new()),
        }
    }

    pub async fn document(&self, id: &str) -> Result<DocumentRecord> {
        let mut memo = self.documents.lock().await;
        if let Some(doc) = memo.get(id) {
            return Ok(doc.clone());
        }
        debug!(document_id = %id, "Fetching document");
        let doc = self.store.document(id).await?;
        memo.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    pub async fn project(&self, id: &str) -> Result<ProjectRecord> {
        let mut memo = self.projects.lock().await;
        if let Some(project) = memo.get(id) {
            return Ok(project.clone());
        }
        let project = self.store.project(id).await?;
        memo.insert(id.to_string(), project.clone());
        Ok(project)
    }

    pub async fn template(&self, id: &str) -> Result<TemplateRecord> {
        let mut memo = self.templates.lock().await;
        if let Some(template) = memo.get(id) {
            return Ok(template.clone());
        }
        let template = self.store.template(id).await?;
        memo.insert(id.to_string(), template.clone());
        Ok(template)
    }

    /// The project a document belongs to, if it names one.
    pub async fn project_for(&self, document_id: &str) -> Result<Option<ProjectRecord>> {
        let doc = self.document(document_id).await?;
        match doc.project_id {
            Some(ref pid) => self.project(pid).await.map(Some),
            None => Ok(None),
        }
    }

    /// The template a document was created from, if it names one.
    pub async fn template_for(&self, document_id: &str) -> Result<Option<TemplateRecord>> {
        let doc = self.document(document_id).await?;
        match doc.template_id {
            Some(ref tid) => self.template(tid).await.map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for DocumentLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLookup").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk fixture layout for [`MemoryDocumentStore::from_json_file`].
///
/// ```json
/// {"documents": [{"id": "d1", "title": "...", "projectId": "p1"}],
///  "projects":  [{"id": "p1", "repoLink": "https://github.com/acme/widgets"}],
///  "templates": []}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFixture {
    pub documents: Vec<DocumentRecord>,
    pub projects: Vec<ProjectRecord>,
    pub templates: Vec<TemplateRecord>,
}

/// Read-only store held in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: HashMap<String, DocumentRecord>,
    projects: HashMap<String, ProjectRecord>,
    templates: HashMap<String, TemplateRecord>,
    reads: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: StoreFixture) -> Self {
        fixture
            .documents
            .into_iter()
            .fold(Self::new(), |store, d| store.with_document(d))
            .with_all_projects(fixture.projects)
            .with_all_templates(fixture.templates)
    }

    /// Load a JSON fixture file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let fixture: StoreFixture = serde_json::from_str(&raw)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_document(mut self, doc: DocumentRecord) -> Self {
        self.documents.insert(doc.id.clone(), doc);
        self
    }

    pub fn with_project(mut self, project: ProjectRecord) -> Self {
        self.projects.insert(project.id.clone(), project);
        self
    }

    pub fn with_template(mut self, template: TemplateRecord) -> Self {
        self.templates.insert(template.id.clone(), template);
        self
    }

    fn with_all_projects(self, projects: Vec<ProjectRecord>) -> Self {
        projects.into_iter().fold(self, |s, p| s.with_project(p))
    }

    fn with_all_templates(self, templates: Vec<TemplateRecord>) -> Self {
        templates.into_iter().fold(self, |s, t| s.with_template(t))
    }

    /// Total reads served, for memoization assertions.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn document(&self, id: &str) -> Result<DocumentRecord> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("document {}", id)))
    }

    async fn project(&self, id: &str) -> Result<ProjectRecord> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.projects
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("project {}", id)))
    }

    async fn template(&self, id: &str) -> Result<TemplateRecord> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("template {}", id)))
    }
}

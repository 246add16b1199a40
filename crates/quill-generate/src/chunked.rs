//! The chunked generation engine.
//!
//! Both one-shot paths share the same shell: load repository context, let a
//! strategy drive a series of bounded model calls, sanitize the result.
//!
//! ```text
//! GenerationJob ──▶ CachedRepository::context ──▶ strategy.produce(session)
//!                                                        │
//!                                                        ▼
//!                                                 sanitize_html ──▶ HTML
//! ```
//!
//! Strategies never see the backend or repository directly; they go
//! through [`GenerationSession`], which logs every call and turns model
//! errors into `None`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use quill_config::GenerateConfig;
use quill_context::{CachedRepository, RepoContext};
use quill_llm::{CompletionRequest, SharedBackend};
use quill_types::{FileRecord, RepoRef};

use crate::error::Result;
use crate::prompts;
use crate::sanitize::sanitize_html;

// ─────────────────────────────────────────────────────────────────────────────
// Job
// ─────────────────────────────────────────────────────────────────────────────

/// One document to generate.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Title used for the top-level heading.
    pub document_name: String,
    /// Free-text template instructions.
    pub template: String,
    pub repo: RepoRef,
}

impl GenerationJob {
    pub fn new(
        document_name: impl Into<String>,
        template: impl Into<String>,
        repo: RepoRef,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            template: template.into(),
            repo,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategy
// ─────────────────────────────────────────────────────────────────────────────

/// How a document is broken into model calls.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Produce the raw document. The engine sanitizes the result.
    async fn produce(&self, session: &GenerationSession<'_>) -> Result<String>;
}

/// Everything a strategy may use while producing one document.
pub struct GenerationSession<'a> {
    pub job: &'a GenerationJob,
    pub context: Arc<RepoContext>,
    generator: &'a ChunkedGenerator,
}

impl GenerationSession<'_> {
    pub fn config(&self) -> &GenerateConfig {
        &self.generator.config
    }

    /// One model call. Failures are logged and reported as `None`.
    pub async fn complete(&self, purpose: &str, prompt: String, budget: u32) -> Option<String> {
        let request = CompletionRequest::new(self.generator.model.clone(), prompt, budget)
            .with_optional_temperature(self.generator.temperature);
        debug!(
            purpose = purpose,
            budget = budget,
            prompt_chars = request.prompt.len(),
            "Calling model"
        );
        match self.generator.backend.complete(request).await {
            Ok(response) if !response.text.trim().is_empty() => Some(response.text),
            Ok(_) => {
                warn!(purpose = purpose, "Model returned empty text");
                None
            }
            Err(e) => {
                warn!(purpose = purpose, error = %e, "Model call failed");
                None
            }
        }
    }

    /// Fetch files from the job's repository, truncated to the file cap.
    pub async fn fetch_files(&self, paths: &[String]) -> Vec<FileRecord> {
        let records = self
            .generator
            .repository
            .fetch_files(&self.job.repo, paths, self.config().file_char_cap)
            .await;
        let fetched = records.iter().filter(|r| r.is_fetched()).count();
        debug!(requested = paths.len(), fetched = fetched, "Fetched repository files");
        records
    }

    pub fn tree_listing(&self) -> String {
        prompts::tree_listing(&self.context.tree, self.config().tree_entry_limit)
    }

    pub fn readme_excerpt(&self) -> String {
        prompts::readme_excerpt(self.context.readme.as_deref(), self.config().readme_excerpt_chars)
    }

    pub fn repository_summary(&self) -> String {
        prompts::repository_summary(&self.context.metadata)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Runs generation jobs with a pluggable [`GenerationStrategy`].
///
/// Jobs are not cancellable; each one runs to completion or failure.
#[derive(Clone)]
pub struct ChunkedGenerator {
    backend: SharedBackend,
    repository: CachedRepository,
    model: String,
    temperature: Option<f32>,
    config: GenerateConfig,
}

impl ChunkedGenerator {
    pub fn new(
        backend: SharedBackend,
        repository: CachedRepository,
        model: impl Into<String>,
        config: GenerateConfig,
    ) -> Self {
        Self {
            backend,
            repository,
            model: model.into(),
            temperature: None,
            config,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Generate one document.
    ///
    /// Fails only when the repository context cannot be loaded or the
    /// strategy produced nothing usable.
    pub async fn generate(
        &self,
        job: &GenerationJob,
        strategy: &dyn GenerationStrategy,
    ) -> Result<String> {
        info!(
            repo = %job.repo,
            document = %job.document_name,
            strategy = strategy.name(),
            "Starting document generation"
        );

        let context = self.repository.context(&job.repo).await.inspect_err(|e| {
            warn!(repo = %job.repo, error = %e, "Repository context unavailable");
        })?;

        let session = GenerationSession {
            job,
            context,
            generator: self,
        };
        let raw = strategy.produce(&session).await?;
        let html = sanitize_html(&raw);

        info!(
            repo = %job.repo,
            strategy = strategy.name(),
            chars = html.len(),
            "Document generated"
        );
        Ok(html)
    }
}

impl std::fmt::Debug for ChunkedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedGenerator")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_context::MemoryRepository;
    use quill_llm::{MockBackend, MockResponse};

    use crate::error::GenerateError;

    /// Strategy that makes one call and returns its text verbatim.
    struct Echo;

    #[async_trait]
    impl GenerationStrategy for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn produce(&self, session: &GenerationSession<'_>) -> Result<String> {
            let prompt = format!("{}\n{}", session.repository_summary(), session.tree_listing());
            session
                .complete("echo", prompt, 16)
                .await
                .ok_or(GenerateError::NoOutput { strategy: "echo" })
        }
    }

    fn generator(backend: Arc<MockBackend>, repo: MemoryRepository) -> ChunkedGenerator {
        ChunkedGenerator::new(
            backend,
            CachedRepository::uncached(Arc::new(repo)),
            "test-model",
            GenerateConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_output_is_sanitized() {
        let backend = Arc::new(MockBackend::with_texts(["```html\n<p>hello</p>\n```"]));
        let repo = MemoryRepository::new("acme/widgets").with_file("src/lib.rs", "");
        let job = GenerationJob::new("Doc", "", RepoRef::new("acme", "widgets"));

        let html = generator(backend.clone(), repo).generate(&job, &Echo).await.unwrap();
        assert_eq!(html, "<h1>Document</h1>\n<p>hello</p>");

        let request = &backend.requests()[0];
        assert_eq!(request.model, "test-model");
        assert!(request.prompt.contains("Repository: acme/widgets"));
        assert!(request.prompt.contains("src/lib.rs"));
    }

    #[tokio::test]
    async fn test_unavailable_repository_is_catastrophic() {
        let backend = Arc::new(MockBackend::repeating("unused"));
        let job = GenerationJob::new("Doc", "", RepoRef::new("acme", "widgets"));

        let err = generator(backend.clone(), MemoryRepository::unavailable())
            .generate(&job, &Echo)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::RepositoryUnavailable(_)));
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_model_errors_become_none() {
        let backend = Arc::new(MockBackend::new(vec![MockResponse::error("overloaded")]));
        let job = GenerationJob::new("Doc", "", RepoRef::new("acme", "widgets"));

        let err = generator(backend, MemoryRepository::new("acme/widgets"))
            .generate(&job, &Echo)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::NoOutput { strategy: "echo" }));
    }
}

//! Shared types for the Quill document orchestrator.
//!
//! Holds the data model that every other crate speaks (conversation
//! messages, repository and document records, fetched files) together with
//! the narrow collaborator traits the orchestration core consumes. The
//! traits live here so that adapters and the core can depend on them without
//! depending on each other.

pub mod document;
pub mod error;
pub mod file;
pub mod message;
pub mod repository;

pub use document::{
    DocumentRecord, DocumentStore, ProjectRecord, SharedDocumentStore, TemplateRecord,
};
pub use error::{CollaboratorError, Result};
pub use file::{FetchStatus, FileRecord, TRUNCATION_MARKER, language_for_path, truncate_chars};
pub use message::{ChatMessage, Conversation, Role};
pub use repository::{
    CommitSummary, EntryKind, RepoMetadata, RepoRef, RepositoryAccessor, SharedRepository,
    TreeEntry,
};

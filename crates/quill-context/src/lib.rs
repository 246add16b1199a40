//! Repository context and document lookups for Quill.
//!
//! The orchestration core never reaches a repository host or document
//! database directly. It talks to the collaborator traits from
//! `quill-types` through the adapters here:
//!
//! - [`CachedRepository`] fronts any [`RepositoryAccessor`](quill_types::RepositoryAccessor)
//!   with an injectable, process-wide [`RepoContextCache`] (LRU + optional TTL).
//! - [`LocalRepository`] serves a local checkout; [`MemoryRepository`] serves fixtures.
//! - [`DocumentLookup`] memoizes document-store reads for one invocation.

pub mod cache;
pub mod documents;
pub mod local;
pub mod memory;
pub mod repo;
pub mod ttl;

pub use cache::{DEFAULT_MAX_ENTRIES, RepoContextCache};
pub use documents::{DocumentLookup, MemoryDocumentStore, StoreFixture};
pub use local::LocalRepository;
pub use memory::MemoryRepository;
pub use repo::{CachedRepository, RepoContext};
pub use ttl::TtlTracker;

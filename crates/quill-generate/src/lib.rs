//! One-shot document generation from a repository.
//!
//! Two strategies share one engine:
//!
//! - [`SectionGenerator`]: pick files, plan sections, write each section in
//!   turn, assemble.
//! - [`FileNegotiator`]: let the model request files over several rounds
//!   until it hands back the finished document.
//!
//! Both return sanitized HTML (see [`sanitize_html`]).

pub mod chunked;
pub mod error;
pub mod negotiate;
pub mod prompts;
pub mod sanitize;
pub mod sections;

pub use chunked::{ChunkedGenerator, GenerationJob, GenerationSession, GenerationStrategy};
pub use error::{GenerateError, Result};
pub use negotiate::FileNegotiator;
pub use sanitize::{DEFAULT_HEADING, escape_html, sanitize_html, strip_wrappers};
pub use sections::{DEFAULT_SECTIONS, SectionGenerator};

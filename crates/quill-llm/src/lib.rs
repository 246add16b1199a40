//! LLM completion client for Quill.
//!
//! The orchestrator only ever asks a model for text: one flattened prompt in,
//! one block of text out. Structure is recovered afterwards by the
//! extraction helpers in [`json`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!    ┌───────────┐       ┌───────────┐
//!    │HttpBackend│       │MockBackend│
//!    └───────────┘       └───────────┘
//! ```

pub mod backend;
pub mod error;
pub mod http;
pub mod json;
pub mod types;

pub use backend::{LlmBackend, MockBackend, MockResponse, SharedBackend, with_retry};
pub use error::{LlmError, RateLimitInfo, Result};
pub use http::{HttpBackend, HttpBackendConfig};
pub use json::{
    Extracted, Strategy, extract_json_array, extract_json_object, first_object_span, parse_lines,
    string_items, strip_trailing_commas, unwrap_fence,
};
pub use types::{CompletionRequest, CompletionResponse, GenerationConfig};

//! Interactive document agent for Quill.
//!
//! A run walks the model through five stages and lets it edit a document
//! only through a closed catalog of tools:
//!
//! ```text
//! ┌─────────────┐  prompt   ┌────────────┐  text   ┌──────────────┐
//! │ StageEngine │──────────▶│ LlmBackend │────────▶│ parse_stage_ │
//! │  (stream)   │◀──────────│            │         │    reply     │
//! └─────────────┘  events   └────────────┘         └──────────────┘
//!        │ toolUsed
//!        ▼
//! ┌─────────────┐  POST     ┌───────────────┐
//! │ ToolBroker  │──────────▶│ tool endpoint │
//! │ + AuditTrail│           └───────────────┘
//! └─────────────┘
//! ```

pub mod audit;
pub mod broker;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod stage;

pub use audit::{AuditTrail, ToolExecutionRecord};
pub use broker::{
    SharedDispatcher, ToolBroker, ToolBrokerConfig, ToolDispatcher, ToolOutcome, sanitize_args,
};
pub use catalog::{ToolInvocation, ToolName};
pub use engine::{AgentEvent, AgentRequest, AgentStream, EngineConfig, StageEngine, StageEvent};
pub use error::{AgentError, ParseError, Result};
pub use parse::{StageReply, parse_stage_reply};
pub use prompt::{PromptFacts, SYSTEM_TEMPLATE, breadcrumb, build_prompt, corrective_message};
pub use stage::{Stage, resolve_transition};

//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Why a model reply could not be turned into a stage object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No strategy found a JSON object in the reply.
    #[error("no JSON object found in response")]
    NoJson,

    /// A required field is absent or empty.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// `stage` is not one of the five protocol stages.
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    /// A toolUsed turn arrived without a tool invocation.
    #[error("toolUsed stage requires a toolInvocation")]
    MissingToolInvocation,

    /// The invocation names a tool outside the catalog.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

impl ParseError {
    /// Whether the corrective prompt should restate the tool catalog.
    pub fn concerns_tools(&self) -> bool {
        matches!(self, Self::MissingToolInvocation | Self::UnknownTool(_))
    }
}

/// Error type for agent operations.
///
/// Runs never fail with this type: model, parse and tool failures surface as
/// events. Only building the tool broker can fail.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::MissingField("content");
        assert_eq!(err.to_string(), "missing required field 'content'");

        let err = AgentError::config("tools.endpoint is empty");
        assert_eq!(err.to_string(), "Configuration error: tools.endpoint is empty");
    }

    #[test]
    fn test_concerns_tools() {
        assert!(ParseError::UnknownTool("rm".to_string()).concerns_tools());
        assert!(ParseError::MissingToolInvocation.concerns_tools());
        assert!(!ParseError::NoJson.concerns_tools());
    }
}

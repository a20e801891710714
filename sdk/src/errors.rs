//! Error types and handling
//!
//! This module provides the error types used throughout the orchestrator.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Taxonomy
//!
//! - **UpstreamModel**: a model call failed or its output could not be parsed.
//!   The current cycle is aborted and the session stays at its last checkpoint.
//! - **SchemaViolation**: parsed model output is missing required fields.
//!   Handled exactly like `UpstreamModel`.
//! - **PersistenceFailure**: the code writer failed. Absorbed by `persist_code`
//!   (reported as `success: false`), surfaced only from direct writer calls.
//! - **ProtocolViolation**: unrepairable call/response pairing in history.
//!   Absorbed by the message-window validator, which drops the offending
//!   messages.
//!
//! A requirement rejected by `validate_requirement` is not an error: it is a
//! clean terminal outcome reported through `SessionResult`.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain model
    /// output, file paths or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried from the last checkpoint.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::UpstreamModel("connection refused".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::MaxStepsExceeded(24);
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Capability errors
    #[error("Upstream model error: {0}")]
    UpstreamModel(String),

    #[error("Schema violation in {capability} output: {detail}")]
    SchemaViolation { capability: String, detail: String },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    // Orchestrator errors
    #[error("Max steps exceeded ({0})")]
    MaxStepsExceeded(u32),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Session errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} has no pending confirmation")]
    NoPendingConfirmation(String),

    #[error("Session {0} is waiting for confirmation")]
    AwaitingConfirmation(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for a schema violation raised by a named capability
    pub fn schema(capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            capability: capability.into(),
            detail: detail.into(),
        }
    }
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::UpstreamModel(_) => "The model call failed. Retry the session",
            Self::SchemaViolation { .. } => "The model returned an incomplete answer. Retry the session",
            Self::PersistenceFailure(_) => "Could not write the generated file. Check the output folder",
            Self::ProtocolViolation(_) => "Conversation history was inconsistent and has been repaired",

            Self::MaxStepsExceeded(_) => "Requirement too complex. Try breaking it into smaller steps",
            Self::LLMTimeout => "The model took too long to respond. Try again",

            Self::SessionNotFound(_) => "Start a new conversation first",
            Self::NoPendingConfirmation(_) => "Nothing is waiting for an answer in this conversation",
            Self::AwaitingConfirmation(_) => "Answer the pending question or start a new conversation",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::MaxStepsExceeded(_) | Self::SessionNotFound(_) => false,

            // All other errors can be retried or are absorbed
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_shorthand() {
        let err = EngineError::schema("refine_requirement", "missing acceptance_criteria");
        assert_eq!(
            err.to_string(),
            "Schema violation in refine_requirement output: missing acceptance_criteria"
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(EngineError::UpstreamModel("x".into()).is_recoverable());
        assert!(EngineError::schema("a", "b").is_recoverable());
        assert!(EngineError::PersistenceFailure("x".into()).is_recoverable());
        assert!(EngineError::LLMTimeout.is_recoverable());
        assert!(!EngineError::Config("x".into()).is_recoverable());
        assert!(!EngineError::MaxStepsExceeded(3).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert_eq!(err.user_hint(), "File system operation failed");
    }
}

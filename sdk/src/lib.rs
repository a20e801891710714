//! Mind2Code SDK
//!
//! Shared error and session types for the orchestrator engine and the
//! UI/host collaborators that drive it.

/// Error types and handling
pub mod errors;

/// Session result and confirmation types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{Choice, ConfirmationKind, ConfirmationRequest, SessionResult};

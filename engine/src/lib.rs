//! Mind2Code Engine Library
//!
//! Turns a natural-language requirement into saved source code by letting a
//! driving model call a fixed set of capabilities. Used by the `mind2code`
//! binary and the integration tests.

/// Orchestrator graph, session state and checkpoints
pub mod agent;

/// The eight capabilities and their registry
pub mod capabilities;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

/// Configuration management module
pub mod config;

/// LLM provider abstraction layer
pub mod llm;

/// Session notifications
pub mod message_bus;

/// Telemetry and Observability
pub mod telemetry;

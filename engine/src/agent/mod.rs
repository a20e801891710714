//! Orchestrator core
//!
//! A session moves through the Decide / Execute / Integrate graph over a
//! single [`ConversationState`]. The confidence gate decides where it stops
//! for a human answer, and checkpoints make every stop resumable.

pub mod checkpoint;
pub mod gate;
pub mod graph;
pub mod prompts;
pub mod service;
pub mod state;
pub mod window;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use gate::{ConfidenceGate, Suspension};
pub use graph::{Node, Orchestrator, StepOutcome};
pub use service::{Confirmer, OrchestratorService, SessionInput, SessionOutcome};
pub use state::ConversationState;
pub use window::validate_window;

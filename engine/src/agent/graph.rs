//! Orchestrator Graph
//!
//! Drives one session through the cycle
//!
//! ```text
//! Decide ──call──▶ Execute ──▶ Integrate ──▶ Decide ...
//!    │                            │
//!    └──no call──▶ Halt ◀──terminal┘
//! ```
//!
//! The run works on an owned copy of the state. Checkpoints are written
//! after every Integrate, at suspension and at Halt; a failing cycle drops
//! the copy, so the session stays exactly at its last checkpoint.
//!
//! # Limits
//!
//! - `max_steps` Decide steps per session
//! - `timeout` per driving-model call

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::agent::checkpoint::CheckpointStore;
use crate::agent::gate::{ConfidenceGate, Suspension};
use crate::agent::prompts::render_decide_prompt;
use crate::agent::state::ConversationState;
use crate::agent::window::validate_window;
use crate::capabilities::CapabilityRegistry;
use crate::llm::{LLMProvider, LLMResponse, Message};
use crate::message_bus::SessionNotifier;
use sdk::errors::EngineError;

/// Default maximum number of Decide steps per session
pub const DEFAULT_MAX_STEPS: u32 = 24;

/// Default number of history messages sent to the driving model
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Default timeout for each driving-model call in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Decide,
    Execute,
    Integrate,
    Halt,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Reached Halt
    Halted(ConversationState),

    /// Stopped for a human answer; resume after recording it
    Suspended {
        state: ConversationState,
        suspension: Suspension,
    },
}

/// Drives sessions through the Decide/Execute/Integrate cycle
pub struct Orchestrator {
    driver: Arc<dyn LLMProvider>,
    registry: Arc<CapabilityRegistry>,
    checkpoints: Arc<CheckpointStore>,
    gate: ConfidenceGate,
    max_steps: u32,
    window_size: usize,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        driver: Arc<dyn LLMProvider>,
        registry: Arc<CapabilityRegistry>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        Self {
            driver,
            registry,
            checkpoints,
            gate: ConfidenceGate::default(),
            max_steps: DEFAULT_MAX_STEPS,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_gate(mut self, gate: ConfidenceGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn gate(&self) -> &ConfidenceGate {
        &self.gate
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointStore> {
        &self.checkpoints
    }

    /// Where a run on `state` starts
    ///
    /// A pending call left by a suspension resumes at Execute, so resuming
    /// never injects a new message.
    pub fn entry_node(state: &ConversationState) -> Node {
        if state.is_terminal() {
            Node::Halt
        } else if state.pending_call().is_some() {
            Node::Execute
        } else {
            Node::Decide
        }
    }

    /// Run the graph until it halts or suspends
    pub async fn run(
        &self,
        session_id: &str,
        mut state: ConversationState,
        notes: &mut SessionNotifier,
    ) -> Result<StepOutcome, EngineError> {
        let mut node = Self::entry_node(&state);
        info!("Session {} entering at {:?}", session_id, node);

        loop {
            if matches!(node, Node::Decide | Node::Execute) {
                if let Some(suspension) = self.gate.evaluate(&state) {
                    info!("Session {} suspended: {:?}", session_id, suspension);
                    self.checkpoints.put(session_id, &state).await;
                    return Ok(StepOutcome::Suspended { state, suspension });
                }
            }

            let next = match node {
                Node::Decide => self.decide(&mut state, notes).await?,
                Node::Execute => self.execute(&mut state, notes).await?,
                Node::Integrate => self.integrate(session_id, &mut state).await,
                Node::Halt => {
                    info!(
                        "Session {} halted after {} steps (code_saved={})",
                        session_id, state.steps, state.code_saved
                    );
                    self.checkpoints.put(session_id, &state).await;
                    return Ok(StepOutcome::Halted(state));
                }
            };

            debug!("Session {}: {:?} -> {:?}", session_id, node, next);
            node = next;
        }
    }

    /// Decide: ask the driving model for the next capability call
    async fn decide(
        &self,
        state: &mut ConversationState,
        notes: &mut SessionNotifier,
    ) -> Result<Node, EngineError> {
        if state.steps >= self.max_steps {
            error!(
                "Session {} exceeded max steps ({})",
                notes.session_id(),
                self.max_steps
            );
            return Err(EngineError::MaxStepsExceeded(self.max_steps));
        }
        state.steps += 1;
        debug!("Decide step {}/{}", state.steps, self.max_steps);

        let mut messages = vec![Message::system(render_decide_prompt(state))];
        messages.extend(validate_window(&state.messages, self.window_size));

        let response = match timeout(self.timeout, self.driver.generate(&messages)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Driving model call failed: {}", e);
                return Err(EngineError::UpstreamModel(e.to_string()));
            }
            Err(_) => {
                error!(
                    "Driving model call timed out after {}s",
                    self.timeout.as_secs()
                );
                return Err(EngineError::LLMTimeout);
            }
        };

        match response {
            LLMResponse::ToolCall(call) => {
                info!(
                    "Driving model chose {} (confidence {:?})",
                    call.name, call.confidence
                );
                let message = Message::assistant_call("", call);
                notes.message(&message).await;
                state.messages.push(message);
                Ok(Node::Execute)
            }
            LLMResponse::FinalAnswer(answer) => {
                debug!("Driving model replied without a call");
                let message = Message::assistant(answer.content);
                notes.message(&message).await;
                state.messages.push(message);
                Ok(Node::Halt)
            }
        }
    }

    /// Execute: run the pending call and append its response
    async fn execute(
        &self,
        state: &mut ConversationState,
        notes: &mut SessionNotifier,
    ) -> Result<Node, EngineError> {
        let Some(call) = state.pending_call().cloned() else {
            warn!("Execute reached without a pending call");
            return Ok(Node::Decide);
        };
        state.approved_call = None;

        notes.status(format!("Running {}", call.name)).await;
        let response = self.registry.execute(&call, state).await?;

        notes.message(&response).await;
        state.messages.push(response);
        Ok(Node::Integrate)
    }

    /// Integrate: fold the response into the state and checkpoint it
    async fn integrate(&self, session_id: &str, state: &mut ConversationState) -> Node {
        if let Some(capability) = state.integrate() {
            debug!("Integrated {} result", capability);
        }
        self.checkpoints.put(session_id, state).await;

        if state.is_terminal() {
            Node::Halt
        } else {
            Node::Decide
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[test]
    fn test_entry_node() {
        let mut state = ConversationState::new("req", None, None);
        assert_eq!(Orchestrator::entry_node(&state), Node::Decide);

        state
            .messages
            .push(Message::assistant_call("", ToolCall::new("c1", "generate_code", "{}")));
        assert_eq!(Orchestrator::entry_node(&state), Node::Execute);

        state.terminate = true;
        assert_eq!(Orchestrator::entry_node(&state), Node::Halt);
    }
}

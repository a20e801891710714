//! Orchestrator Service
//!
//! Session-level entry points around the [`Orchestrator`]: start a session,
//! answer its confirmation question, retry a failed cycle. One turn runs per
//! session at a time; a second caller on the same session id waits for the
//! first to return.

use async_trait::async_trait;
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{Choice, ConfirmationRequest, SessionResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::agent::checkpoint::CheckpointStore;
use crate::agent::gate::{ConfidenceGate, Suspension};
use crate::agent::graph::{Orchestrator, StepOutcome};
use crate::agent::state::ConversationState;
use crate::capabilities::{CapabilityRegistry, WorkspaceWriter};
use crate::config::Config;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::message_bus::{Event, Notifier, SessionNotifier};

/// Everything a caller supplies to start a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInput {
    pub input: String,
    pub repo_context: Option<String>,
    pub user_profile: Option<String>,
}

impl SessionInput {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_repo_context(mut self, repo_context: impl Into<String>) -> Self {
        self.repo_context = Some(repo_context.into());
        self
    }

    pub fn with_user_profile(mut self, user_profile: impl Into<String>) -> Self {
        self.user_profile = Some(user_profile.into());
        self
    }
}

/// Where a turn left the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Finished(SessionResult),
    Suspended(ConfirmationRequest),
}

/// Answers confirmation questions on behalf of the user
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn ask_confirmation(&self, request: &ConfirmationRequest) -> Choice;
}

/// Per-session front end to the orchestrator
pub struct OrchestratorService {
    orchestrator: Orchestrator,
    notifier: Arc<dyn Notifier>,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionNotifier>>>>,
}

impl OrchestratorService {
    pub fn new(orchestrator: Orchestrator, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            orchestrator,
            notifier,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the router, the registry and the workspace writer from config
    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let router: Arc<dyn LLMProvider> = Arc::new(LLMRouter::from_config(&config.llm));
        Self::with_provider(config, router, notifier)
    }

    /// Same as [`Self::from_config`] with an explicit model provider
    ///
    /// The provider serves both the driving model and the capabilities.
    /// `timeout_secs` bounds each provider attempt, so a whole model call
    /// may take that long once per attempt the provider makes.
    pub fn with_provider(
        config: &Config,
        provider: Arc<dyn LLMProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let timeout =
            Duration::from_secs(config.llm.timeout_secs) * provider.max_attempts().max(1);
        let writer = Arc::new(WorkspaceWriter::new(config.core.workspace.clone()));
        let registry = CapabilityRegistry::new(
            Arc::clone(&provider),
            writer,
            config.core.output_root.clone(),
        )
        .with_timeout(timeout);

        let orchestrator = Orchestrator::new(
            provider,
            Arc::new(registry),
            Arc::new(CheckpointStore::new()),
        )
        .with_gate(ConfidenceGate::new(
            config.orchestrator.confidence_threshold,
        ))
        .with_max_steps(config.orchestrator.max_steps)
        .with_window_size(config.orchestrator.window_size)
        .with_timeout(timeout);

        Self::new(orchestrator, notifier)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Start a fresh conversation on `session_id`
    ///
    /// Any previous history for the id is discarded, including which
    /// messages were already reported.
    pub async fn start(
        &self,
        session_id: &str,
        input: SessionInput,
    ) -> Result<SessionOutcome, EngineError> {
        let slot = self.slot(session_id).await;
        let mut notes = slot.lock().await;

        info!("Starting session {}", session_id);
        let state = ConversationState::new(input.input, input.repo_context, input.user_profile);
        self.orchestrator
            .checkpoints()
            .reset(session_id, &state)
            .await;
        notes.reset();

        self.advance(session_id, state, &mut notes).await
    }

    /// Answer the question a suspended session is waiting on, then resume
    pub async fn confirm(
        &self,
        session_id: &str,
        choice: Choice,
    ) -> Result<SessionOutcome, EngineError> {
        let slot = self.slot(session_id).await;
        let mut notes = slot.lock().await;

        let mut state = self.latest_state(session_id).await?;
        let Some(suspension) = self.orchestrator.gate().evaluate(&state) else {
            warn!("Session {} got an answer it did not ask for", session_id);
            return Err(EngineError::NoPendingConfirmation(session_id.to_string()));
        };

        info!("Session {} answered {:?} to {:?}", session_id, choice, suspension);
        match suspension {
            Suspension::LowConfidence { call_id, .. } => {
                if choice.is_accept() {
                    state.approved_call = Some(call_id);
                } else if let Some(call) = state.pending_call().cloned() {
                    state.cancel_call(&call);
                }
            }
            Suspension::Improvement { .. } => {
                state.record_improvement_choice(choice.is_accept());
            }
        }
        self.orchestrator.checkpoints().put(session_id, &state).await;

        self.advance(session_id, state, &mut notes).await
    }

    /// Resume a session from its latest checkpoint after a failed cycle
    pub async fn retry(&self, session_id: &str) -> Result<SessionOutcome, EngineError> {
        let slot = self.slot(session_id).await;
        let mut notes = slot.lock().await;

        let state = self.latest_state(session_id).await?;
        if self.orchestrator.gate().evaluate(&state).is_some() {
            return Err(EngineError::AwaitingConfirmation(session_id.to_string()));
        }

        info!("Retrying session {} from step {}", session_id, state.steps);
        self.advance(session_id, state, &mut notes).await
    }

    /// Latest checkpointed state of a session
    pub async fn snapshot(&self, session_id: &str) -> Option<ConversationState> {
        self.orchestrator
            .checkpoints()
            .latest(session_id)
            .await
            .map(|c| c.state.clone())
    }

    /// Forget a session: its checkpoint and its notification history
    ///
    /// Returns whether the session existed.
    pub async fn remove(&self, session_id: &str) -> bool {
        let slot = self.sessions.lock().await.remove(session_id);
        let checkpoint = self.orchestrator.checkpoints().remove(session_id).await;
        if checkpoint.is_some() {
            debug!("Removed session {}", session_id);
        }
        slot.is_some() || checkpoint.is_some()
    }

    /// Run a session to its end, asking `confirmer` whenever it suspends
    ///
    /// A failed cycle ends the drive with the error in the result; the
    /// checkpoint stays, so the session can still be retried.
    pub async fn drive(
        &self,
        session_id: &str,
        input: SessionInput,
        confirmer: &dyn Confirmer,
    ) -> SessionResult {
        let mut outcome = self.start(session_id, input).await;
        loop {
            match outcome {
                Ok(SessionOutcome::Finished(result)) => return result,
                Ok(SessionOutcome::Suspended(request)) => {
                    let choice = confirmer.ask_confirmation(&request).await;
                    outcome = self.confirm(session_id, choice).await;
                }
                Err(e) => return SessionResult::failed(e.to_string()),
            }
        }
    }

    async fn slot(&self, session_id: &str) -> Arc<Mutex<SessionNotifier>> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(SessionNotifier::new(
                session_id,
                Arc::clone(&self.notifier),
            )))
        });
        Arc::clone(slot)
    }

    async fn latest_state(&self, session_id: &str) -> Result<ConversationState, EngineError> {
        self.snapshot(session_id)
            .await
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    /// Run the graph and report how the turn ended
    async fn advance(
        &self,
        session_id: &str,
        state: ConversationState,
        notes: &mut SessionNotifier,
    ) -> Result<SessionOutcome, EngineError> {
        match self.orchestrator.run(session_id, state, notes).await {
            Ok(StepOutcome::Halted(state)) => {
                let result = state.result();
                notes
                    .send(Event::SessionFinished {
                        session_id: session_id.to_string(),
                        result: result.clone(),
                    })
                    .await;
                Ok(SessionOutcome::Finished(result))
            }
            Ok(StepOutcome::Suspended { suspension, .. }) => {
                let request = suspension.to_request(session_id);
                notes
                    .send(Event::ConfirmationRequested {
                        request: request.clone(),
                    })
                    .await;
                Ok(SessionOutcome::Suspended(request))
            }
            Err(e) => {
                error!("Session {} cycle failed: {}", session_id, e);
                notes
                    .send(Event::Error {
                        session_id: session_id.to_string(),
                        error: e.to_string(),
                        hint: e.user_hint().to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }
}

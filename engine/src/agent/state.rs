//! Conversation State
//!
//! The single mutable record of a session. Only the orchestrator writes to
//! it, and only through [`ConversationState::integrate`] for capability
//! results, so every field group has exactly one place where it changes.

use crate::capabilities::{Capability, CapabilityOutput, CapabilityResult, Language};
use crate::llm::{Message, MessageRole, ToolCall};
use sdk::types::SessionResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Per-session conversation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Original user text
    pub input: String,

    /// Full message history, oldest first
    pub messages: Vec<Message>,

    /// Opaque repository metadata, used as prompt text only
    pub repo_context: Option<String>,

    /// Opaque cognitive profile, used as prompt text only
    pub user_profile: Option<String>,

    pub is_requirement: Option<bool>,
    pub refined_requirement: Option<String>,
    pub language: Option<Language>,
    pub filename: Option<String>,
    pub generated_code: Option<String>,
    pub proposed_followup: Option<String>,

    /// Answer to the improvement question; `None` until asked and answered
    pub improvement_confirmed: Option<bool>,

    pub improved_code: Option<String>,
    pub awaiting_confirmation: bool,
    pub code_saved: bool,
    pub terminate: bool,

    /// Confidence reported by the most recent capability result
    pub last_confidence: f64,

    /// Decide steps taken so far
    pub steps: u32,

    /// Call the user explicitly allowed to run despite low confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_call: Option<String>,
}

impl ConversationState {
    /// Fresh state holding only the input and the opening user message
    pub fn new(
        input: impl Into<String>,
        repo_context: Option<String>,
        user_profile: Option<String>,
    ) -> Self {
        let input = input.into();
        Self {
            messages: vec![Message::user(input.clone())],
            input,
            repo_context,
            user_profile,
            is_requirement: None,
            refined_requirement: None,
            language: None,
            filename: None,
            generated_code: None,
            proposed_followup: None,
            improvement_confirmed: None,
            improved_code: None,
            awaiting_confirmation: false,
            code_saved: false,
            terminate: false,
            last_confidence: 1.0,
            steps: 0,
            approved_call: None,
        }
    }

    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        self.terminate || self.code_saved
    }

    /// The call issued by the last message, if nothing answered it yet
    pub fn pending_call(&self) -> Option<&ToolCall> {
        let last = self.messages.last()?;
        match last.role {
            MessageRole::Assistant => last.tool_call.as_ref(),
            _ => None,
        }
    }

    /// Integrate: fold the latest tool message into the state
    ///
    /// Content that is not a capability result (error notes, cancellation
    /// records) is ignored. Returns the capability that was folded.
    pub fn integrate(&mut self) -> Option<Capability> {
        let last = self.messages.last()?;
        if last.role != MessageRole::Tool {
            return None;
        }

        match CapabilityResult::from_content(&last.content) {
            Some(result) => {
                let capability = result.output.capability();
                self.fold(result);
                Some(capability)
            }
            None => {
                debug!(
                    "Tool message from {:?} carries no capability result",
                    last.name
                );
                None
            }
        }
    }

    /// Fold one capability result into its field group
    ///
    /// First write wins, except `implement_improvement`, which always
    /// overwrites `generated_code` and `improved_code`.
    pub fn fold(&mut self, result: CapabilityResult) {
        if self.is_terminal() {
            warn!(
                "Ignoring {} result: session state is terminal",
                result.output.capability()
            );
            return;
        }

        if let Some(confidence) = result.confidence {
            self.last_confidence = confidence;
        }

        match result.output {
            CapabilityOutput::ValidateRequirement { is_requirement } => {
                if set_once(&mut self.is_requirement, is_requirement, Capability::ValidateRequirement)
                    && !is_requirement
                {
                    self.terminate = true;
                }
            }
            CapabilityOutput::RefineRequirement {
                refined_requirement,
            } => {
                set_once(
                    &mut self.refined_requirement,
                    refined_requirement,
                    Capability::RefineRequirement,
                );
            }
            CapabilityOutput::ClassifyLanguage { language } => {
                set_once(&mut self.language, language, Capability::ClassifyLanguage);
            }
            CapabilityOutput::ExtractFilename { filename } => {
                set_once(&mut self.filename, filename, Capability::ExtractFilename);
            }
            CapabilityOutput::GenerateCode { code } => {
                set_once(&mut self.generated_code, code, Capability::GenerateCode);
            }
            CapabilityOutput::ProposeFollowup { followup_question } => {
                if set_once(
                    &mut self.proposed_followup,
                    followup_question,
                    Capability::ProposeFollowup,
                ) && self.improvement_confirmed.is_none()
                {
                    self.awaiting_confirmation = true;
                }
            }
            CapabilityOutput::ImplementImprovement { improved_code } => {
                self.generated_code = Some(improved_code.clone());
                self.improved_code = Some(improved_code);
            }
            CapabilityOutput::PersistCode { success, .. } => {
                if success {
                    self.code_saved = true;
                    self.awaiting_confirmation = false;
                }
            }
        }
    }

    /// Record the answer to the improvement question
    pub fn record_improvement_choice(&mut self, accepted: bool) {
        self.improvement_confirmed = Some(accepted);
    }

    /// Record a declined low-confidence call and end the session
    ///
    /// The call gets a tool response so the history stays pairing-consistent.
    pub fn cancel_call(&mut self, call: &ToolCall) {
        self.messages.push(Message::tool_result(
            &call.name,
            "CANCELLED: the user declined this step",
            &call.id,
        ));
        self.terminate = true;
    }

    /// Caller-facing summary once the orchestrator halted
    pub fn result(&self) -> SessionResult {
        SessionResult {
            completed: true,
            code_saved: self.code_saved,
            is_requirement: self.is_requirement,
            generated_code: self.generated_code.clone(),
            filename: self.filename.clone(),
            error: None,
        }
    }
}

/// Set `slot` if empty; returns whether the value was written
fn set_once<T>(slot: &mut Option<T>, value: T, capability: Capability) -> bool {
    if slot.is_some() {
        warn!(
            "Duplicate {} result ignored: field already set",
            capability
        );
        return false;
    }
    *slot = Some(value);
    true
}

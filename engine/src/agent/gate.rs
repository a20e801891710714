//! Confidence Gate
//!
//! Decides, from the session state alone, whether the orchestrator may keep
//! going or must wait for a human answer. Because the decision is derived
//! from state rather than remembered, a resumed or retried session lands
//! on the same question it was suspended on.

use crate::agent::state::ConversationState;
use crate::capabilities::Capability;
use sdk::types::ConfirmationRequest;
use tracing::debug;

/// Why the orchestrator stopped before its next step
#[derive(Debug, Clone, PartialEq)]
pub enum Suspension {
    /// A pending call reported confidence below the threshold
    LowConfidence {
        call_id: String,
        capability: String,
        confidence: f64,
    },

    /// A follow-up improvement was proposed and not yet answered
    Improvement { question: String },
}

impl Suspension {
    /// Question to put to the confirmation surface
    pub fn to_request(&self, session_id: &str) -> ConfirmationRequest {
        match self {
            Suspension::LowConfidence {
                call_id,
                capability,
                confidence,
            } => ConfirmationRequest::low_confidence(session_id, capability, call_id, *confidence),
            Suspension::Improvement { question } => {
                ConfirmationRequest::improvement(session_id, question)
            }
        }
    }
}

/// Threshold policy for auto-continuing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f64,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Suspension the state calls for, if any
    ///
    /// Any pending call reporting a confidence below the threshold
    /// suspends, whatever the capability. Calls without a reported
    /// confidence and calls the user already approved auto-continue.
    pub fn evaluate(&self, state: &ConversationState) -> Option<Suspension> {
        if state.is_terminal() {
            return None;
        }

        if let Some(call) = state.pending_call() {
            if state.approved_call.as_deref() == Some(call.id.as_str()) {
                return None;
            }
            return match call.confidence {
                Some(confidence) if confidence < self.threshold => {
                    debug!(
                        "Gate: {} at confidence {:.2} needs confirmation",
                        call.name, confidence
                    );
                    Some(Suspension::LowConfidence {
                        call_id: call.id.clone(),
                        capability: call.name.clone(),
                        confidence,
                    })
                }
                _ => None,
            };
        }

        if state.awaiting_confirmation && state.improvement_confirmed.is_none() {
            let question = state.proposed_followup.clone().unwrap_or_else(|| {
                format!(
                    "Run {} on the generated code?",
                    Capability::ImplementImprovement
                )
            });
            return Some(Suspension::Improvement { question });
        }

        None
    }
}

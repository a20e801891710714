//! Session-facing types shared with UI and host collaborators

use serde::{Deserialize, Serialize};

/// Final result of a requirement-to-code session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// The session reached its terminal state
    pub completed: bool,

    /// Code was written by `persist_code`
    pub code_saved: bool,

    /// Outcome of `validate_requirement`, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_requirement: Option<bool>,

    /// Latest generated (or improved) code, fenced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,

    /// Filename chosen by `extract_filename`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Error surfaced to the caller, if the session failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionResult {
    /// Result for a session that failed before reaching a terminal state
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Why a session is waiting for a human answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmationKind {
    /// The driving model proposed a capability call with low confidence
    LowConfidence {
        capability: String,
        call_id: String,
        confidence: f64,
    },

    /// A follow-up improvement was proposed; apply it or save as is
    Improvement { question: String },
}

/// A binary question put to the external confirmation surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub session_id: String,
    pub kind: ConfirmationKind,
    pub prompt: String,
    /// Labels for the accept and decline options, in that order
    pub options: [String; 2],
}

impl ConfirmationRequest {
    /// Build a proceed/cancel request for a low-confidence call
    pub fn low_confidence(
        session_id: impl Into<String>,
        capability: impl Into<String>,
        call_id: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let capability = capability.into();
        Self {
            session_id: session_id.into(),
            prompt: format!(
                "The assistant wants to run '{}' (confidence {:.2}). Proceed?",
                capability, confidence
            ),
            kind: ConfirmationKind::LowConfidence {
                capability,
                call_id: call_id.into(),
                confidence,
            },
            options: ["Proceed".to_string(), "Cancel".to_string()],
        }
    }

    /// Build an improve/skip request for a proposed follow-up
    pub fn improvement(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            session_id: session_id.into(),
            prompt: question.clone(),
            kind: ConfirmationKind::Improvement { question },
            options: ["Improve code".to_string(), "Save as is".to_string()],
        }
    }
}

/// Selection returned by the confirmation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Accept,
    Decline,
}

impl Choice {
    /// Parse a free-text yes/no answer; anything unrecognised declines
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "s" | "si" | "sì" | "proceed" | "ok" => Choice::Accept,
            _ => Choice::Decline,
        }
    }

    pub fn is_accept(self) -> bool {
        matches!(self, Choice::Accept)
    }
}

//! Message-Window Validator
//!
//! Builds the bounded slice of history sent to the driving model. Every
//! tool message in the window answers a call issued inside the window, and
//! every call in the window is answered inside it, so the model never sees
//! half of a call/response pair.

use crate::llm::{Message, MessageRole};
use sdk::errors::EngineError;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Largest pairing-consistent suffix of `messages` holding at most `max_len`
/// messages
///
/// Messages that can never be paired (orphan responses, duplicate call ids,
/// calls that were never answered) are dropped first and logged as protocol
/// violations. The remaining history is then shrunk from the front, one
/// message at a time, until the suffix fits and is consistent; the loop is
/// bounded by `max_len` and ends at the empty window at the latest.
pub fn validate_window(messages: &[Message], max_len: usize) -> Vec<Message> {
    let repaired = drop_unpairable(messages);

    let mut start = repaired.len().saturating_sub(max_len);
    while start < repaired.len() && !is_pairing_consistent(&repaired[start..]) {
        start += 1;
    }

    if start > 0 {
        debug!(
            "Message window keeps {} of {} messages",
            repaired.len() - start,
            messages.len()
        );
    }
    repaired[start..].to_vec()
}

/// Whether every response matches one earlier call and every call is answered
pub fn is_pairing_consistent(messages: &[Message]) -> bool {
    let mut issued = HashSet::new();
    let mut answered = HashSet::new();

    for message in messages {
        match message.role {
            MessageRole::Assistant => {
                if let Some(id) = message.issued_call_id() {
                    if !issued.insert(id) {
                        return false;
                    }
                }
            }
            MessageRole::Tool => match message.answered_call_id() {
                Some(id) if issued.contains(id) && answered.insert(id) => {}
                _ => return false,
            },
            _ => {}
        }
    }

    issued.len() == answered.len()
}

/// Remove messages that no window could ever pair
fn drop_unpairable(messages: &[Message]) -> Vec<Message> {
    let mut issued: HashSet<&str> = HashSet::new();
    let mut answered: HashSet<&str> = HashSet::new();
    let mut keep = vec![true; messages.len()];

    for (i, message) in messages.iter().enumerate() {
        match message.role {
            MessageRole::Assistant => {
                if let Some(id) = message.issued_call_id() {
                    if !issued.insert(id) {
                        report(i, format!("call id '{}' issued twice", id));
                        keep[i] = false;
                    }
                }
            }
            MessageRole::Tool => match message.answered_call_id() {
                Some(id) if issued.contains(id) => {
                    if !answered.insert(id) {
                        report(i, format!("call '{}' answered twice", id));
                        keep[i] = false;
                    }
                }
                Some(id) => {
                    report(i, format!("response to unknown call '{}'", id));
                    keep[i] = false;
                }
                None => {
                    report(i, "tool message without call id".to_string());
                    keep[i] = false;
                }
            },
            _ => {}
        }
    }

    for (i, message) in messages.iter().enumerate() {
        if !keep[i] || message.role != MessageRole::Assistant {
            continue;
        }
        if let Some(id) = message.issued_call_id() {
            if !answered.contains(id) {
                report(i, format!("call '{}' was never answered", id));
                keep[i] = false;
            }
        }
    }

    messages
        .iter()
        .zip(keep)
        .filter_map(|(message, kept)| kept.then(|| message.clone()))
        .collect()
}

fn report(index: usize, detail: String) {
    let violation = EngineError::ProtocolViolation(detail);
    warn!("Dropping message {} from window: {}", index, violation);
}

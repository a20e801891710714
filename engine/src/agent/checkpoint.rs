//! Checkpoint Store
//!
//! Process-local, in-memory snapshots of session state. A checkpoint is
//! never mutated: each write replaces the session's entry with a new
//! `Arc`, so readers holding an older snapshot keep a consistent view.

use crate::agent::state::ConversationState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Immutable, timestamped copy of a session's state
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub session_id: String,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    /// Monotonic write counter for the session
    pub sequence: u64,
}

/// Latest checkpoint per session
#[derive(Debug, Default)]
pub struct CheckpointStore {
    checkpoints: RwLock<HashMap<String, Arc<Checkpoint>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session's checkpoint with a snapshot of `state`
    pub async fn put(&self, session_id: &str, state: &ConversationState) -> Arc<Checkpoint> {
        let mut checkpoints = self.checkpoints.write().await;
        let sequence = checkpoints
            .get(session_id)
            .map(|c| c.sequence + 1)
            .unwrap_or(0);

        let checkpoint = Arc::new(Checkpoint {
            session_id: session_id.to_string(),
            state: state.clone(),
            created_at: Utc::now(),
            sequence,
        });

        debug!(
            "Checkpoint {} for session {} ({} messages)",
            sequence,
            session_id,
            state.messages.len()
        );
        checkpoints.insert(session_id.to_string(), Arc::clone(&checkpoint));
        checkpoint
    }

    /// Latest checkpoint for a session
    pub async fn latest(&self, session_id: &str) -> Option<Arc<Checkpoint>> {
        self.checkpoints.read().await.get(session_id).cloned()
    }

    /// Start a session over: the old history is discarded, not merged
    pub async fn reset(&self, session_id: &str, state: &ConversationState) -> Arc<Checkpoint> {
        self.remove(session_id).await;
        self.put(session_id, state).await
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Checkpoint>> {
        self.checkpoints.write().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_replaces_previous_checkpoint() {
        let store = CheckpointStore::new();
        let mut state = ConversationState::new("req", None, None);

        let first = store.put("s1", &state).await;
        state.steps = 3;
        let second = store.put("s1", &state).await;

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.state.steps, 0);

        let latest = store.latest("s1").await.unwrap();
        assert_eq!(latest.state.steps, 3);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reset_discards_history() {
        let store = CheckpointStore::new();
        let mut state = ConversationState::new("first requirement", None, None);
        state.language = Some(crate::capabilities::Language::Go);
        store.put("s1", &state).await;

        let fresh = ConversationState::new("second requirement", None, None);
        let checkpoint = store.reset("s1", &fresh).await;

        assert_eq!(checkpoint.sequence, 0);
        assert_eq!(checkpoint.state.input, "second requirement");
        assert!(checkpoint.state.language.is_none());
        assert_eq!(checkpoint.state.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store = CheckpointStore::new();
        assert!(store.latest("nope").await.is_none());
        assert!(store.remove("nope").await.is_none());
        assert!(store.is_empty().await);
    }
}

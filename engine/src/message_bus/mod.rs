//! Message Bus for session notifications
//!
//! The orchestrator reports what happens in a session (status changes,
//! assistant messages, capability results, confirmation requests, final
//! results, errors) as typed [`Event`]s. UIs subscribe to the bus; the
//! orchestrator only sees the [`Notifier`] trait.
//!
//! Channels are bounded. A subscriber that stops draining its channel
//! loses events instead of stalling the session.

use async_trait::async_trait;
use sdk::types::{ConfirmationRequest, SessionResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::llm::{Message, MessageRole};

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be subscribed to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    Status,
    AssistantMessage,
    ToolResult,
    ConfirmationRequested,
    SessionFinished,
    Error,
    /// Subscribe to all event types
    All,
}

/// Events published on the message bus
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Progress note, e.g. the capability about to run
    Status { session_id: String, message: String },
    /// Reply from the driving model
    AssistantMessage { session_id: String, content: String },
    /// Output of a capability call
    ToolResult {
        session_id: String,
        capability: String,
        content: String,
    },
    /// The session is waiting for a yes/no answer
    ConfirmationRequested { request: ConfirmationRequest },
    /// The session halted
    SessionFinished {
        session_id: String,
        result: SessionResult,
    },
    /// A cycle failed; the session stays at its last checkpoint
    Error {
        session_id: String,
        error: String,
        hint: String,
    },
}

impl Event {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Status { .. } => EventType::Status,
            Event::AssistantMessage { .. } => EventType::AssistantMessage,
            Event::ToolResult { .. } => EventType::ToolResult,
            Event::ConfirmationRequested { .. } => EventType::ConfirmationRequested,
            Event::SessionFinished { .. } => EventType::SessionFinished,
            Event::Error { .. } => EventType::Error,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Event::Status { session_id, .. }
            | Event::AssistantMessage { session_id, .. }
            | Event::ToolResult { session_id, .. }
            | Event::SessionFinished { session_id, .. }
            | Event::Error { session_id, .. } => session_id,
            Event::ConfirmationRequested { request } => &request.session_id,
        }
    }
}

/// Observability surface the orchestrator reports to
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: Event);
}

/// Message bus for pub/sub notification delivery
pub struct MessageBus {
    /// Map of event types to lists of subscribers
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<Event>>>>>,
}

impl MessageBus {
    /// Create a new MessageBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type, or `EventType::All`
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to its subscribers and to `All` subscribers
    ///
    /// Closed subscribers are pruned. Full channels drop the event.
    pub async fn publish(&self, event: Event) {
        let mut channels = self.channels.lock().await;
        let event_type = event.event_type();

        for key in [event_type, EventType::All] {
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Subscriber channel full, dropping {:?}", event_type);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MessageBus {
    async fn notify(&self, event: Event) {
        self.publish(event).await;
    }
}

/// Per-session notification front end
///
/// Each distinct assistant or tool message content is reported once, even
/// when a retried cycle produces the same message again.
pub struct SessionNotifier {
    session_id: String,
    notifier: Arc<dyn Notifier>,
    seen: HashSet<String>,
}

impl SessionNotifier {
    pub fn new(session_id: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            session_id: session_id.into(),
            notifier,
            seen: HashSet::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Forget delivered content, for a fresh conversation
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Report a history message; returns whether an event was sent
    pub async fn message(&mut self, message: &Message) -> bool {
        let event = match message.role {
            MessageRole::Assistant => Event::AssistantMessage {
                session_id: self.session_id.clone(),
                content: message.wire_content(),
            },
            MessageRole::Tool => Event::ToolResult {
                session_id: self.session_id.clone(),
                capability: message.name.clone().unwrap_or_default(),
                content: message.content.clone(),
            },
            _ => return false,
        };

        let content = match &event {
            Event::AssistantMessage { content, .. } | Event::ToolResult { content, .. } => content,
            _ => return false,
        };
        if !self.seen.insert(content.clone()) {
            debug!("Suppressing duplicate notification in {}", self.session_id);
            return false;
        }

        self.notifier.notify(event).await;
        true
    }

    pub async fn status(&self, message: impl Into<String>) {
        self.notifier
            .notify(Event::Status {
                session_id: self.session_id.clone(),
                message: message.into(),
            })
            .await;
    }

    pub async fn send(&self, event: Event) {
        self.notifier.notify(event).await;
    }
}

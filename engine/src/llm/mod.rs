//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the models the orchestrator
//! talks to: the driving model that decides which capability to call next,
//! and the backing model each capability uses to produce its output. Both go
//! through the `LLMProvider` trait so the router, the HTTP providers and
//! test doubles are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
///
/// Assistant messages may carry a capability call; tool messages answer
/// exactly one such call through `tool_call_id` and name the capability
/// that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,

    /// Capability call issued by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,

    /// Call ID this tool message responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Capability name on tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    /// Create an assistant message that issues a capability call
    pub fn assistant_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// Create a new tool result message
    pub fn tool_result(
        name: impl Into<String>,
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }

    /// Call ID issued by this message, if it is an assistant call
    pub fn issued_call_id(&self) -> Option<&str> {
        match self.role {
            MessageRole::Assistant => self.tool_call.as_ref().map(|c| c.id.as_str()),
            _ => None,
        }
    }

    /// Call ID answered by this message, if it is a tool response
    pub fn answered_call_id(&self) -> Option<&str> {
        match self.role {
            MessageRole::Tool => self.tool_call_id.as_deref(),
            _ => None,
        }
    }

    /// Content as sent over the wire
    ///
    /// Assistant calls are rendered back into the `{"function": ..., "arguments": ...}`
    /// shape the driving model emitted, so the model sees its own protocol.
    pub fn wire_content(&self) -> String {
        match &self.tool_call {
            Some(call) if self.role == MessageRole::Assistant => {
                let arguments = serde_json::from_str::<serde_json::Value>(&call.arguments)
                    .unwrap_or(serde_json::Value::Null);
                serde_json::json!({
                    "function": &call.name,
                    "arguments": arguments,
                })
                .to_string()
            }
            _ => self.content.clone(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,

    /// Tool result message
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// LLM wants to call a capability
    ToolCall(ToolCall),

    /// LLM has provided a final answer
    FinalAnswer(FinalAnswer),
}

/// Capability call request from the driving model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this call
    pub id: String,

    /// Name of the capability to call
    pub name: String,

    /// Arguments to pass to the capability (JSON string)
    pub arguments: String,

    /// Self-reported confidence in `[0, 1]`, when the model gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            confidence: None,
        }
    }

    /// Attach a self-reported confidence, clamped to `[0, 1]`
    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0));
        self
    }
}

/// Final answer from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// The answer content
    pub content: String,
}

impl FinalAnswer {
    /// Create a new final answer
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama)
    fn is_local(&self) -> bool;

    /// How many sequential attempts one `complete` call may make
    ///
    /// Callers bounding a whole call scale their time limit by this.
    fn max_attempts(&self) -> u32 {
        1
    }

    /// Return the raw text completion for a conversation
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Generate a response, classifying it as a capability call or a final answer
    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse> {
        let content = self.complete(messages).await?;
        if let Some(tool_call) = parse_tool_calls(&content) {
            return Ok(LLMResponse::ToolCall(tool_call));
        }
        Ok(LLMResponse::FinalAnswer(FinalAnswer::new(content)))
    }

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Helper function to parse capability calls from string content.
///
/// Handles multiple LLM output formats:
/// 1. Raw JSON: `{"function": "...", "arguments": {...}}`
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. JSON embedded in prose; scans for `{"function":` anywhere
///
/// The confidence is read from `arguments.confidence` or a top-level
/// `confidence` key.
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    // Pattern 1: Raw JSON (entire content is valid JSON with "function" key)
    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    // Pattern 2: Extract from markdown code fences (even with trailing text)
    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    // Pattern 3: Scan for {"function": anywhere in the content
    if let Some(pos) = trimmed.find("{\"function\"") {
        let candidate = &trimmed[pos..];
        if let Some(json_str) = extract_balanced_json(candidate) {
            if let Some(tc) = try_parse_function_json(json_str) {
                return Some(tc);
            }
        }
    }

    None
}

/// Try to parse a string as a `{"function": "...", "arguments": {...}}` call.
fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let confidence = arguments
        .get("confidence")
        .or_else(|| json.get("confidence"))
        .and_then(|c| c.as_f64());

    Some(
        ToolCall::new(
            format!("call_{}", uuid::Uuid::new_v4()),
            function,
            arguments.to_string(),
        )
        .with_confidence(confidence),
    )
}

/// Locate a JSON object in model output: raw, fenced, or embedded in prose.
///
/// Used by capability decoders, which ask the backing model for a single
/// JSON object but cannot rely on it being returned bare.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed);
    }
    if let Some(inner) = extract_fenced_json(trimmed) {
        let inner = inner.trim();
        if inner.starts_with('{') {
            return Some(inner);
        }
    }
    let pos = trimmed.find('{')?;
    extract_balanced_json(&trimmed[pos..])
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

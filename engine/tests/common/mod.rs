//! Shared test doubles for the orchestrator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mind2code_engine::agent::{Confirmer, OrchestratorService};
use mind2code_engine::capabilities::{prompts, Capability};
use mind2code_engine::config::Config;
use mind2code_engine::llm::{LLMError, LLMProvider, Message};
use mind2code_engine::message_bus::{Event, Notifier};
use sdk::types::{Choice, ConfirmationKind, ConfirmationRequest};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const REQUIREMENT: &str = "Add input validation to the login form";

/// Model double serving both the driving model and the capabilities
///
/// Requests whose system prompt belongs to a capability get that
/// capability's canned reply. Everything else is a Decide call and pops the
/// next scripted driver reply; an empty script answers in plain text.
pub struct ScriptedProvider {
    driver: Mutex<VecDeque<Result<String, String>>>,
    replies: Mutex<HashMap<Capability, String>>,
    invocations: Mutex<Vec<Capability>>,
    inputs: Mutex<Vec<(Capability, String)>>,
    decide_prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(driver: Vec<String>) -> Self {
        Self {
            driver: Mutex::new(driver.into_iter().map(Ok).collect()),
            replies: Mutex::new(default_replies()),
            invocations: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            decide_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, capability: Capability, reply: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(capability, reply.to_string());
        self
    }

    /// Queue a failing Decide call ahead of the current script
    pub fn fail_next_decide(&self, reason: &str) {
        self.driver
            .lock()
            .unwrap()
            .push_front(Err(reason.to_string()));
    }

    pub fn push_decide(&self, reply: String) {
        self.driver.lock().unwrap().push_back(Ok(reply));
    }

    pub fn invocations(&self) -> Vec<Capability> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn decide_calls(&self) -> usize {
        self.decide_prompts.lock().unwrap().len()
    }

    /// User input rendered for every call to `capability`
    pub fn inputs_for(&self, capability: Capability) -> Vec<String> {
        self.inputs
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == capability)
            .map(|(_, input)| input.clone())
            .collect()
    }

    /// System prompt of every Decide call, oldest first
    pub fn decide_prompts(&self) -> Vec<String> {
        self.decide_prompts.lock().unwrap().clone()
    }

    fn capability_for(messages: &[Message]) -> Option<Capability> {
        let system = messages.first()?;
        Capability::ALL
            .iter()
            .copied()
            .find(|c| prompts::system_prompt(*c) == Some(system.content.as_str()))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LLMError> {
        if let Some(capability) = Self::capability_for(messages) {
            self.invocations.lock().unwrap().push(capability);
            let input = messages.get(1).map(|m| m.content.clone()).unwrap_or_default();
            self.inputs.lock().unwrap().push((capability, input));
            return self
                .replies
                .lock()
                .unwrap()
                .get(&capability)
                .cloned()
                .ok_or_else(|| LLMError::InvalidRequest(format!("no reply for {}", capability)));
        }

        let system = messages.first().map(|m| m.content.clone()).unwrap_or_default();
        self.decide_prompts.lock().unwrap().push(system);
        match self.driver.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(LLMError::NetworkError(reason)),
            None => Ok("All done.".to_string()),
        }
    }
}

fn default_replies() -> HashMap<Capability, String> {
    HashMap::from([
        (
            Capability::ValidateRequirement,
            r#"{"requirement": true}"#.to_string(),
        ),
        (
            Capability::RefineRequirement,
            r#"{"user_story": "As a user I want my login input validated", "acceptance_criteria": ["Empty email is rejected", "Short passwords are rejected"]}"#
                .to_string(),
        ),
        (
            Capability::ClassifyLanguage,
            r#"{"language": "TypeScript"}"#.to_string(),
        ),
        (
            Capability::ExtractFilename,
            r#"{"filename": "loginValidation.js"}"#.to_string(),
        ),
        (
            Capability::GenerateCode,
            "```json\n{\"code_block\": \"export function validate() {}\"}\n```".to_string(),
        ),
        (
            Capability::ProposeFollowup,
            r#"{"followup": "Should I add unit tests for the validator"}"#.to_string(),
        ),
        (
            Capability::ImplementImprovement,
            r#"{"improved_code": "export function validate() { return true; }"}"#.to_string(),
        ),
    ])
}

/// Driving-model reply calling `capability`
pub fn call(capability: Capability, confidence: f64) -> String {
    format!(
        r#"{{"function": "{}", "arguments": {{}}, "confidence": {}}}"#,
        capability.name(),
        confidence
    )
}

/// The whole workflow up to the improvement question, at one confidence
pub fn script_until_followup(confidence: f64) -> Vec<String> {
    [
        Capability::ValidateRequirement,
        Capability::RefineRequirement,
        Capability::ClassifyLanguage,
        Capability::ExtractFilename,
        Capability::GenerateCode,
        Capability::ProposeFollowup,
    ]
    .into_iter()
    .map(|c| call(c, confidence))
    .collect()
}

/// Notifier that keeps every event
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Confirmer answering from a script and keeping every question
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<Choice>>,
    asked: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<Choice>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<ConfirmationRequest> {
        self.asked.lock().unwrap().clone()
    }

    pub fn low_confidence_prompts(&self) -> usize {
        self.asked()
            .iter()
            .filter(|r| matches!(r.kind, ConfirmationKind::LowConfidence { .. }))
            .count()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn ask_confirmation(&self, request: &ConfirmationRequest) -> Choice {
        self.asked.lock().unwrap().push(request.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Choice::Decline)
    }
}

pub fn test_config(workspace: &Path) -> Config {
    let mut config = Config::default_config();
    config.core.workspace = workspace.to_path_buf();
    config
}

pub fn service(
    workspace: &Path,
    provider: &Arc<ScriptedProvider>,
    notifier: &Arc<RecordingNotifier>,
) -> OrchestratorService {
    OrchestratorService::with_provider(
        &test_config(workspace),
        Arc::clone(provider) as Arc<dyn LLMProvider>,
        Arc::clone(notifier) as Arc<dyn Notifier>,
    )
}

//! Capability Registry
//!
//! The eight units of work the driving model can ask for, modelled as a
//! closed enum. A call goes through three typed stages:
//!
//! 1. [`CallArguments`]: lenient decoding of whatever JSON the driving model
//!    put in the call.
//! 2. [`CapabilityRequest`]: the typed inputs, resolved from the session
//!    state first and the call arguments second.
//! 3. [`CapabilityResult`]: the typed output, serialised as the tool
//!    message content and decoded again by Integrate.
//!
//! Call-level mistakes (unknown capability, missing inputs) are answered
//! with an `ERROR:` tool message so the driving model can correct itself.
//! Backing-model failures abort the cycle with `UpstreamModel` or
//! `SchemaViolation`. Write failures are reported as `success: false`.

pub mod language;
pub mod persist;
pub mod prompts;

pub use language::Language;
pub use persist::{output_path, strip_code_fence, CodeWriter, WorkspaceWriter};

use crate::agent::state::ConversationState;
use crate::llm::{extract_json_object, LLMProvider, Message, ToolCall};
use regex::Regex;
use sdk::errors::EngineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time limit for one backing-model call
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A named capability the driving model can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ValidateRequirement,
    RefineRequirement,
    ClassifyLanguage,
    ExtractFilename,
    GenerateCode,
    ProposeFollowup,
    ImplementImprovement,
    PersistCode,
}

impl Capability {
    /// All capabilities, in their conventional calling order
    pub const ALL: [Capability; 8] = [
        Capability::ValidateRequirement,
        Capability::RefineRequirement,
        Capability::ClassifyLanguage,
        Capability::ExtractFilename,
        Capability::GenerateCode,
        Capability::ProposeFollowup,
        Capability::ImplementImprovement,
        Capability::PersistCode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::ValidateRequirement => "validate_requirement",
            Capability::RefineRequirement => "refine_requirement",
            Capability::ClassifyLanguage => "classify_language",
            Capability::ExtractFilename => "extract_filename",
            Capability::GenerateCode => "generate_code",
            Capability::ProposeFollowup => "propose_followup",
            Capability::ImplementImprovement => "implement_improvement",
            Capability::PersistCode => "persist_code",
        }
    }

    /// Look up a capability by the name the driving model used
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.name() == name).or(match name {
            "is_requirement" => Some(Capability::ValidateRequirement),
            "save_code" => Some(Capability::PersistCode),
            _ => None,
        })
    }

    /// One-line description advertised to the driving model
    pub fn description(self) -> &'static str {
        match self {
            Capability::ValidateRequirement => {
                "Check whether the input is a software requirement. Arguments: requirement, confidence."
            }
            Capability::RefineRequirement => {
                "Turn the requirement into a user story with acceptance criteria. Arguments: requirement."
            }
            Capability::ClassifyLanguage => {
                "Choose the programming language for the requirement. Arguments: requirement, confidence."
            }
            Capability::ExtractFilename => {
                "Choose a filename with the language's extension. Arguments: requirement, language, confidence."
            }
            Capability::GenerateCode => {
                "Generate code satisfying the refined requirement. Arguments: requirement, language."
            }
            Capability::ProposeFollowup => {
                "Propose one yes/no improvement question about the generated code. Arguments: confidence."
            }
            Capability::ImplementImprovement => {
                "Apply the confirmed follow-up improvement to the generated code. Arguments: followup."
            }
            Capability::PersistCode => {
                "Save the latest code under the chosen filename. Arguments: filename, confidence."
            }
        }
    }

    /// Whether the capability echoes the call's confidence in its result
    pub fn reports_confidence(self) -> bool {
        matches!(
            self,
            Capability::ValidateRequirement
                | Capability::ClassifyLanguage
                | Capability::ExtractFilename
                | Capability::ProposeFollowup
                | Capability::PersistCode
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments as the driving model wrote them
///
/// Every field is optional and several spellings are accepted; the session
/// state is the primary source of inputs anyway.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallArguments {
    #[serde(alias = "text", alias = "input", alias = "refined_requirement")]
    pub requirement: Option<String>,

    #[serde(alias = "generated_code", alias = "improved_code")]
    pub code: Option<String>,

    pub filename: Option<String>,

    pub language: Option<String>,

    #[serde(alias = "followup_question", alias = "question")]
    pub followup: Option<String>,
}

impl CallArguments {
    /// Decode call arguments, falling back to empty on malformed JSON
    pub fn parse(arguments: &str) -> Self {
        match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => {
                debug!("Ignoring unusable call arguments ({}): {}", e, arguments);
                Self::default()
            }
        }
    }
}

/// Typed inputs of one capability invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityRequest {
    ValidateRequirement {
        text: String,
    },
    RefineRequirement {
        text: String,
        repo_context: Option<String>,
        user_profile: Option<String>,
    },
    ClassifyLanguage {
        requirement: String,
        refined_requirement: Option<String>,
        repo_context: Option<String>,
        user_profile: Option<String>,
    },
    ExtractFilename {
        requirement: String,
        language: Language,
        repo_context: Option<String>,
    },
    GenerateCode {
        requirement: String,
        language: Language,
        user_profile: Option<String>,
    },
    ProposeFollowup {
        requirement: String,
        code: String,
    },
    ImplementImprovement {
        code: String,
        followup: String,
        language: Language,
    },
    PersistCode {
        code: String,
        filename: String,
    },
}

impl CapabilityRequest {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityRequest::ValidateRequirement { .. } => Capability::ValidateRequirement,
            CapabilityRequest::RefineRequirement { .. } => Capability::RefineRequirement,
            CapabilityRequest::ClassifyLanguage { .. } => Capability::ClassifyLanguage,
            CapabilityRequest::ExtractFilename { .. } => Capability::ExtractFilename,
            CapabilityRequest::GenerateCode { .. } => Capability::GenerateCode,
            CapabilityRequest::ProposeFollowup { .. } => Capability::ProposeFollowup,
            CapabilityRequest::ImplementImprovement { .. } => Capability::ImplementImprovement,
            CapabilityRequest::PersistCode { .. } => Capability::PersistCode,
        }
    }

    /// Build the typed request for `capability`
    ///
    /// Values already folded into the state win over the call arguments,
    /// so a model echoing a stale or paraphrased value cannot override
    /// what earlier steps decided. Context and profile only ever come from
    /// the state.
    pub fn resolve(
        capability: Capability,
        arguments: &CallArguments,
        state: &ConversationState,
    ) -> Result<Self, EngineError> {
        let missing = |what: &str| {
            EngineError::schema(
                capability.name(),
                format!("missing input '{}'; run the step that produces it first", what),
            )
        };

        let requirement = || {
            state
                .refined_requirement
                .clone()
                .or_else(|| arguments.requirement.clone())
                .unwrap_or_else(|| state.input.clone())
        };
        let language = || {
            state
                .language
                .or_else(|| arguments.language.as_deref().map(Language::normalize))
                .ok_or_else(|| missing("language"))
        };
        let code = || {
            state
                .generated_code
                .clone()
                .or_else(|| arguments.code.clone())
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| missing("code"))
        };

        let request = match capability {
            Capability::ValidateRequirement => CapabilityRequest::ValidateRequirement {
                text: state.input.clone(),
            },
            Capability::RefineRequirement => CapabilityRequest::RefineRequirement {
                text: state.input.clone(),
                repo_context: state.repo_context.clone(),
                user_profile: state.user_profile.clone(),
            },
            Capability::ClassifyLanguage => CapabilityRequest::ClassifyLanguage {
                requirement: state.input.clone(),
                refined_requirement: state.refined_requirement.clone(),
                repo_context: state.repo_context.clone(),
                user_profile: state.user_profile.clone(),
            },
            Capability::ExtractFilename => CapabilityRequest::ExtractFilename {
                requirement: requirement(),
                language: language()?,
                repo_context: state.repo_context.clone(),
            },
            Capability::GenerateCode => CapabilityRequest::GenerateCode {
                requirement: requirement(),
                language: language()?,
                user_profile: state.user_profile.clone(),
            },
            Capability::ProposeFollowup => CapabilityRequest::ProposeFollowup {
                requirement: requirement(),
                code: code()?,
            },
            Capability::ImplementImprovement => CapabilityRequest::ImplementImprovement {
                code: code()?,
                followup: state
                    .proposed_followup
                    .clone()
                    .or_else(|| arguments.followup.clone())
                    .ok_or_else(|| missing("followup"))?,
                language: language()?,
            },
            Capability::PersistCode => CapabilityRequest::PersistCode {
                code: code()?,
                filename: state
                    .filename
                    .clone()
                    .or_else(|| arguments.filename.clone())
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| missing("filename"))?,
            },
        };

        Ok(request)
    }
}

/// Typed output of a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum CapabilityOutput {
    ValidateRequirement {
        is_requirement: bool,
    },
    RefineRequirement {
        refined_requirement: String,
    },
    ClassifyLanguage {
        language: Language,
    },
    ExtractFilename {
        filename: String,
    },
    GenerateCode {
        code: String,
    },
    ProposeFollowup {
        followup_question: String,
    },
    ImplementImprovement {
        improved_code: String,
    },
    PersistCode {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl CapabilityOutput {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityOutput::ValidateRequirement { .. } => Capability::ValidateRequirement,
            CapabilityOutput::RefineRequirement { .. } => Capability::RefineRequirement,
            CapabilityOutput::ClassifyLanguage { .. } => Capability::ClassifyLanguage,
            CapabilityOutput::ExtractFilename { .. } => Capability::ExtractFilename,
            CapabilityOutput::GenerateCode { .. } => Capability::GenerateCode,
            CapabilityOutput::ProposeFollowup { .. } => Capability::ProposeFollowup,
            CapabilityOutput::ImplementImprovement { .. } => Capability::ImplementImprovement,
            CapabilityOutput::PersistCode { .. } => Capability::PersistCode,
        }
    }
}

/// Capability output plus the confidence it reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub output: CapabilityOutput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CapabilityResult {
    pub fn new(output: CapabilityOutput, confidence: Option<f64>) -> Self {
        let confidence = confidence
            .filter(|_| output.capability().reports_confidence())
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));
        Self { output, confidence }
    }

    /// Serialise as tool message content
    pub fn to_content(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| {
            EngineError::schema(self.output.capability().name(), format!("unserialisable result: {}", e))
        })
    }

    /// Decode tool message content; `None` for error or cancellation notes
    pub fn from_content(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }
}

#[derive(Debug, Deserialize)]
struct ValidateReply {
    #[serde(alias = "is_requirement")]
    requirement: bool,
}

#[derive(Debug, Deserialize)]
struct RefineReply {
    user_story: String,
    acceptance_criteria: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassifyReply {
    language: String,
}

#[derive(Debug, Deserialize)]
struct FilenameReply {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CodeReply {
    #[serde(alias = "code")]
    code_block: String,
}

#[derive(Debug, Deserialize)]
struct FollowupReply {
    #[serde(alias = "followup_question", alias = "question")]
    followup: String,
}

#[derive(Debug, Deserialize)]
struct ImprovementReply {
    #[serde(alias = "code")]
    improved_code: String,
}

/// Dispatches capability calls to the backing model and the code writer
pub struct CapabilityRegistry {
    provider: Arc<dyn LLMProvider>,
    writer: Arc<dyn CodeWriter>,
    output_root: PathBuf,
    timeout: Duration,
}

impl CapabilityRegistry {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        writer: Arc<dyn CodeWriter>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            writer,
            output_root: output_root.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the time limit for each backing-model call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a driving-model call against the session state
    ///
    /// Returns the tool message answering the call. Unknown capabilities and
    /// unresolvable inputs are answered with an `ERROR:` message rather
    /// than failing the cycle.
    pub async fn execute(
        &self,
        call: &ToolCall,
        state: &ConversationState,
    ) -> Result<Message, EngineError> {
        let Some(capability) = Capability::from_name(&call.name) else {
            warn!("Driving model called unknown capability '{}'", call.name);
            return Ok(Message::tool_result(
                &call.name,
                format!("ERROR: unknown capability '{}'", call.name),
                &call.id,
            ));
        };

        let arguments = CallArguments::parse(&call.arguments);
        let request = match CapabilityRequest::resolve(capability, &arguments, state) {
            Ok(request) => request,
            Err(e) => {
                warn!("Cannot run {}: {}", capability, e);
                return Ok(Message::tool_result(
                    capability.name(),
                    format!("ERROR: {}", e),
                    &call.id,
                ));
            }
        };

        let result = self.invoke(request, call.confidence).await?;
        Ok(Message::tool_result(
            capability.name(),
            result.to_content()?,
            &call.id,
        ))
    }

    /// Invoke a capability with typed inputs
    pub async fn invoke(
        &self,
        request: CapabilityRequest,
        confidence: Option<f64>,
    ) -> Result<CapabilityResult, EngineError> {
        let capability = request.capability();
        info!("Invoking capability {}", capability);

        let output = match request {
            CapabilityRequest::ValidateRequirement { text } => {
                let input = prompts::render_input(&[("Input to analyze", Some(text.as_str()))]);
                let reply: ValidateReply = self.ask(capability, input).await?;
                CapabilityOutput::ValidateRequirement {
                    is_requirement: reply.requirement,
                }
            }

            CapabilityRequest::RefineRequirement {
                text,
                repo_context,
                user_profile,
            } => {
                let input = prompts::render_input(&[
                    ("User request", Some(text.as_str())),
                    ("Repository context", repo_context.as_deref()),
                    ("User profile", user_profile.as_deref()),
                ]);
                let reply: RefineReply = self.ask(capability, input).await?;
                CapabilityOutput::RefineRequirement {
                    refined_requirement: render_refinement(&reply)?,
                }
            }

            CapabilityRequest::ClassifyLanguage {
                requirement,
                refined_requirement,
                repo_context,
                user_profile,
            } => {
                let explicit = Language::mentioned_in(&requirement)
                    .or_else(|| refined_requirement.as_deref().and_then(Language::mentioned_in));

                let language = match explicit {
                    Some(language) => {
                        debug!("Requirement names {} explicitly", language);
                        language
                    }
                    None => {
                        let input = prompts::render_input(&[
                            ("Requirement", Some(requirement.as_str())),
                            ("Refined requirement", refined_requirement.as_deref()),
                            ("Repository context", repo_context.as_deref()),
                            ("User profile", user_profile.as_deref()),
                        ]);
                        let reply: ClassifyReply = self.ask(capability, input).await?;
                        Language::normalize(&reply.language)
                    }
                };
                CapabilityOutput::ClassifyLanguage { language }
            }

            CapabilityRequest::ExtractFilename {
                requirement,
                language,
                repo_context,
            } => {
                let input = prompts::render_input(&[
                    ("Requirement", Some(requirement.as_str())),
                    ("Target language", Some(language.as_str())),
                    ("Repository context", repo_context.as_deref()),
                ]);
                let reply: FilenameReply = self.ask(capability, input).await?;
                let suggested = reply.filename.trim();
                if suggested.is_empty() {
                    return Err(EngineError::schema(capability.name(), "empty filename"));
                }
                CapabilityOutput::ExtractFilename {
                    filename: language::with_canonical_extension(suggested, language),
                }
            }

            CapabilityRequest::GenerateCode {
                requirement,
                language,
                user_profile,
            } => {
                let input = prompts::render_input(&[
                    ("Requirement", Some(requirement.as_str())),
                    ("Target language", Some(language.as_str())),
                    ("User profile", user_profile.as_deref()),
                ]);
                let reply: CodeReply = self.ask(capability, input).await?;
                CapabilityOutput::GenerateCode {
                    code: fence_code(capability, &reply.code_block, language)?,
                }
            }

            CapabilityRequest::ProposeFollowup { requirement, code } => {
                let input = prompts::render_input(&[
                    ("Refined requirement", Some(requirement.as_str())),
                    ("Generated code", Some(code.as_str())),
                ]);
                let reply: FollowupReply = self.ask(capability, input).await?;
                let question = as_question(&reply.followup)
                    .ok_or_else(|| EngineError::schema(capability.name(), "empty followup"))?;
                CapabilityOutput::ProposeFollowup {
                    followup_question: question,
                }
            }

            CapabilityRequest::ImplementImprovement {
                code,
                followup,
                language,
            } => {
                let input = prompts::render_input(&[
                    ("Original code", Some(code.as_str())),
                    ("Follow-up suggestion", Some(followup.as_str())),
                    ("Programming language", Some(language.as_str())),
                ]);
                let reply: ImprovementReply = self.ask(capability, input).await?;
                CapabilityOutput::ImplementImprovement {
                    improved_code: fence_code(capability, &reply.improved_code, language)?,
                }
            }

            CapabilityRequest::PersistCode { code, filename } => self.persist(&code, &filename).await,
        };

        Ok(CapabilityResult::new(output, confidence))
    }

    /// Write code under the output root; failures become `success: false`
    async fn persist(&self, code: &str, filename: &str) -> CapabilityOutput {
        let written = match output_path(&self.output_root, filename) {
            Ok(path) => self.writer.write(&path, &strip_code_fence(code)).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(path) => {
                info!("Code saved to {}", path.display());
                CapabilityOutput::PersistCode {
                    success: true,
                    path: Some(path.display().to_string()),
                    error: None,
                }
            }
            Err(e) => {
                warn!("persist_code failed: {}", e);
                CapabilityOutput::PersistCode {
                    success: false,
                    path: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Ask the backing model for a JSON object and decode it
    async fn ask<T: DeserializeOwned>(
        &self,
        capability: Capability,
        input: String,
    ) -> Result<T, EngineError> {
        let system = prompts::system_prompt(capability).ok_or_else(|| {
            EngineError::UpstreamModel(format!("{} has no backing prompt", capability))
        })?;
        let messages = [Message::system(system), Message::user(input)];

        let content = tokio::time::timeout(self.timeout, self.provider.complete(&messages))
            .await
            .map_err(|_| EngineError::LLMTimeout)?
            .map_err(|e| EngineError::UpstreamModel(format!("{}: {}", capability, e)))?;

        let json = extract_json_object(&content).ok_or_else(|| {
            EngineError::UpstreamModel(format!("{} returned no JSON object", capability))
        })?;
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            EngineError::UpstreamModel(format!("{} returned invalid JSON: {}", capability, e))
        })?;

        serde_json::from_value(value).map_err(|e| EngineError::schema(capability.name(), e.to_string()))
    }
}

static CRITERION_LABEL: OnceLock<Regex> = OnceLock::new();

/// Render a refinement as "User Story:" plus numbered acceptance criteria
fn render_refinement(reply: &RefineReply) -> Result<String, EngineError> {
    let label = CRITERION_LABEL.get_or_init(|| {
        Regex::new(r"(?i)^(?:[-*]\s*)?(?:\*\*)?(?:ac\s*#?\s*\d+\s*(?:\*\*)?\s*[:.)-]?(?:\*\*)?)?\s*")
            .expect("Invalid criterion pattern")
    });

    let story = reply
        .user_story
        .trim()
        .trim_start_matches("**User Story:**")
        .trim_start_matches("User Story:")
        .trim();
    if story.is_empty() {
        return Err(EngineError::schema("refine_requirement", "empty user_story"));
    }

    let criteria: Vec<String> = reply
        .acceptance_criteria
        .iter()
        .map(|c| label.replace(c.trim(), "").trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if criteria.is_empty() {
        return Err(EngineError::schema(
            "refine_requirement",
            "at least one acceptance criterion is required",
        ));
    }

    let mut rendered = format!("User Story:\n{}\n\nAcceptance Criteria:", story);
    for (i, criterion) in criteria.iter().enumerate() {
        rendered.push_str(&format!("\n- AC #{}: {}", i + 1, criterion));
    }
    Ok(rendered)
}

/// Wrap model code in a fenced block tagged with the language
fn fence_code(capability: Capability, code: &str, language: Language) -> Result<String, EngineError> {
    let code = strip_code_fence(code);
    let code = code.trim_matches('\n');
    if code.trim().is_empty() {
        return Err(EngineError::schema(capability.name(), "empty code"));
    }
    Ok(format!("```{}\n{}\n```", language, code))
}

/// Force a yes/no follow-up to read as a question
fn as_question(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(['.', '!', ':', ';']).trim_end();
    if text.is_empty() {
        return None;
    }
    if text.ends_with('?') {
        Some(text.to_string())
    } else {
        Some(format!("{}?", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ConversationState {
        ConversationState::new("Add input validation to the login form", None, None)
    }

    #[test]
    fn test_capability_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(Capability::from_name(capability.name()), Some(capability));
        }
        assert_eq!(
            Capability::from_name("save_code"),
            Some(Capability::PersistCode)
        );
        assert_eq!(Capability::from_name("delete_repo"), None);
    }

    #[test]
    fn test_call_arguments_are_lenient() {
        let args = CallArguments::parse(r#"{"text": "x", "generated_code": "y", "extra": 1}"#);
        assert_eq!(args.requirement.as_deref(), Some("x"));
        assert_eq!(args.code.as_deref(), Some("y"));

        let args = CallArguments::parse("not json");
        assert!(args.requirement.is_none());
    }

    #[test]
    fn test_resolve_prefers_state_over_arguments() {
        let mut state = state();
        state.language = Some(Language::Go);
        let args = CallArguments::parse(r#"{"language": "python"}"#);

        let request =
            CapabilityRequest::resolve(Capability::GenerateCode, &args, &state).unwrap();
        match request {
            CapabilityRequest::GenerateCode { language, requirement, .. } => {
                assert_eq!(language, Language::Go);
                assert_eq!(requirement, "Add input validation to the login form");
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_resolve_reports_missing_inputs() {
        let args = CallArguments::default();
        let err = CapabilityRequest::resolve(Capability::PersistCode, &args, &state()).unwrap_err();
        assert!(matches!(err, EngineError::SchemaViolation { .. }));
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_result_content_round_trip() {
        let result = CapabilityResult::new(
            CapabilityOutput::ClassifyLanguage {
                language: Language::Typescript,
            },
            Some(0.8),
        );
        let content = result.to_content().unwrap();
        assert!(content.contains(r#""capability":"classify_language""#));
        assert_eq!(CapabilityResult::from_content(&content), Some(result));
        assert_eq!(CapabilityResult::from_content("ERROR: nope"), None);
    }

    #[test]
    fn test_confidence_only_for_reporting_capabilities() {
        let result = CapabilityResult::new(
            CapabilityOutput::GenerateCode {
                code: "```python\nx\n```".to_string(),
            },
            Some(0.3),
        );
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn test_render_refinement() {
        let reply = RefineReply {
            user_story: "**User Story:** As a user, I want validation, so that errors are caught."
                .to_string(),
            acceptance_criteria: vec![
                "AC #1: Empty email is rejected".to_string(),
                "- Password shorter than 8 characters is rejected".to_string(),
                "   ".to_string(),
            ],
        };
        let rendered = render_refinement(&reply).unwrap();
        assert_eq!(
            rendered,
            "User Story:\nAs a user, I want validation, so that errors are caught.\n\n\
             Acceptance Criteria:\n\
             - AC #1: Empty email is rejected\n\
             - AC #2: Password shorter than 8 characters is rejected"
        );
    }

    #[test]
    fn test_refinement_requires_a_criterion() {
        let reply = RefineReply {
            user_story: "As a user...".to_string(),
            acceptance_criteria: vec![],
        };
        assert!(matches!(
            render_refinement(&reply),
            Err(EngineError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_fence_code() {
        let fenced = fence_code(Capability::GenerateCode, "def f():\n    pass", Language::Python).unwrap();
        assert_eq!(fenced, "```python\ndef f():\n    pass\n```");

        let refenced =
            fence_code(Capability::GenerateCode, "```py\nx = 1\n```", Language::Python).unwrap();
        assert_eq!(refenced, "```python\nx = 1\n```");

        assert!(fence_code(Capability::GenerateCode, "  \n ", Language::Go).is_err());
    }

    #[test]
    fn test_as_question() {
        assert_eq!(
            as_question("Vuoi aggiungere i test unitari."),
            Some("Vuoi aggiungere i test unitari?".to_string())
        );
        assert_eq!(
            as_question("Add rate limiting?"),
            Some("Add rate limiting?".to_string())
        );
        assert_eq!(as_question("  "), None);
    }
}

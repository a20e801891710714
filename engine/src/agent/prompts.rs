//! Decide prompt for the driving model
//!
//! The step order is steered here and nowhere else; the orchestrator does
//! not enforce it.

use crate::agent::state::ConversationState;
use crate::capabilities::Capability;

const DECIDE_TEMPLATE: &str = r#"You are an agent that turns one software requirement into saved source code by calling capabilities.

## USER PROFILE
{user_profile}

Code structure, naming, comments and abstraction must follow this profile.

## REPOSITORY CONTEXT
{repo_context}

Prefer the repository's most used language, its frameworks and its naming conventions.

## CAPABILITIES
{capabilities}

Call exactly one capability per reply, as a JSON object:
{"function": "<capability name>", "arguments": {...}, "confidence": <0..1>}
The confidence is your certainty that this call is the right next step.
Reply with plain text and no JSON object when the work is finished.

## CURRENT INPUT
"{input}"

## WORKFLOW
1. Call validate_requirement first. If the input is not a requirement, stop.
2. Call refine_requirement.
3. Call classify_language.
4. Call extract_filename.
5. Call generate_code.
6. Call propose_followup.
7. Improvement decision: {improvement_confirmed}
   - true: call implement_improvement, then persist_code.
   - false: do not call implement_improvement; call persist_code.
   - undecided: stop and wait for the user's decision.
8. Stop after persist_code succeeds.

Never call a capability whose step is already done.

## PROGRESS
{progress}"#;

/// Render the Decide instruction for the current state
pub fn render_decide_prompt(state: &ConversationState) -> String {
    let capabilities = Capability::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.name(), c.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let improvement_confirmed = match state.improvement_confirmed {
        Some(true) => "true",
        Some(false) => "false",
        None => "undecided",
    };

    DECIDE_TEMPLATE
        .replace("{user_profile}", or_none(state.user_profile.as_deref()))
        .replace("{repo_context}", or_none(state.repo_context.as_deref()))
        .replace("{capabilities}", &capabilities)
        .replace("{improvement_confirmed}", improvement_confirmed)
        .replace("{progress}", &progress(state))
        .replace("{input}", &state.input)
}

fn or_none(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "(none)",
    }
}

/// Which steps already produced their output
fn progress(state: &ConversationState) -> String {
    let done = |flag: bool| if flag { "done" } else { "pending" };
    let steps = [
        (
            Capability::ValidateRequirement,
            done(state.is_requirement.is_some()),
        ),
        (
            Capability::RefineRequirement,
            done(state.refined_requirement.is_some()),
        ),
        (Capability::ClassifyLanguage, done(state.language.is_some())),
        (Capability::ExtractFilename, done(state.filename.is_some())),
        (Capability::GenerateCode, done(state.generated_code.is_some())),
        (
            Capability::ProposeFollowup,
            done(state.proposed_followup.is_some()),
        ),
        (
            Capability::ImplementImprovement,
            done(state.improved_code.is_some()),
        ),
        (Capability::PersistCode, done(state.code_saved)),
    ];

    let mut lines: Vec<String> = steps
        .iter()
        .map(|(c, status)| format!("- {}: {}", c.name(), status))
        .collect();
    if let Some(language) = state.language {
        lines.push(format!("Language: {}", language));
    }
    if let Some(filename) = &state.filename {
        lines.push(format!("Filename: {}", filename));
    }
    lines.join("\n")
}

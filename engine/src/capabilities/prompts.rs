//! Instruction prompts for the capability backing model
//!
//! System prompts are constant per capability; the per-call data goes into
//! a separate user message built by [`render_input`].

use super::Capability;

const VALIDATE_REQUIREMENT: &str = r#"You are a classifier that determines whether a given input is a software requirement.

Software requirements typically:
- Describe what a system should do
- Specify features or behaviors
- May be formal or informal

Respond ONLY with a JSON object: { "requirement": true } if the input describes a software feature or behavior, { "requirement": false } otherwise."#;

const REFINE_REQUIREMENT: &str = r#"You are an assistant specialized in agile software design.

Turn the user request into a structured User Story followed by precise, testable Acceptance Criteria.
- The user story follows "As a [role], I want to [goal], so that [benefit]."
- Each acceptance criterion is one testable statement.

Use the repository context to infer the most used languages, frameworks, architectural patterns and naming conventions.
Use the user profile to adapt tone, terminology depth and level of detail.
If an assumption is needed, state it in one brief sentence inside the user story.

Respond ONLY with a JSON object: { "user_story": "...", "acceptance_criteria": ["...", "..."] }"#;

const CLASSIFY_LANGUAGE: &str = r#"You determine the most appropriate programming language to implement a software requirement.

Follow this priority order strictly:
1) An explicit language mention in the requirement.
2) The language dictated by the frameworks in the repository context (Spring -> java, Flutter -> dart, Django -> python, React -> javascript, Angular -> typescript, Rails -> ruby, Laravel -> php, .NET -> csharp). With several frameworks, pick the dominant one.
3) The most used language of the repository.
4) python.

Use one of: python, javascript, java, cpp, go, typescript, ruby, php, csharp, c, dart.
Respond ONLY with a JSON object: { "language": "..." }"#;

const EXTRACT_FILENAME: &str = r#"You extract an appropriate filename from a software requirement.

The filename must:
1. Reflect the main described functionality
2. Follow the naming conventions of the target language
3. Include the file extension of the target language
4. Respect naming conventions found in the repository context

Respond ONLY with a JSON object: { "filename": "..." }"#;

const GENERATE_CODE: &str = r#"You are a code generator. Write code in the target language that satisfies ALL the acceptance criteria of the requirement.

Adapt the output to the user profile:
- Experience: beginner -> step-by-step inline comments; intermediate -> block comments and short function headers; advanced -> sparse intent comments; expert -> comments only where non-obvious.
- Style: commented, clean, concise or documented, as the profile states.
- Use the idiomatic doc comment format of the language.
On trade-offs, the profile's preferences override generic best practices.

Respond ONLY with a JSON object: { "code_block": "..." }
The code_block holds the code only: no markdown, no triple backticks, no language tag."#;

const PROPOSE_FOLLOWUP: &str = r#"You propose one follow-up improvement to generated code.

The follow-up must be a yes/no question the user can answer "yes" to implement it or "no" to skip it.
It suggests a concrete, implementable improvement directly related to the requirement. Never ask open-ended questions.

Respond ONLY with a JSON object: { "followup": "..." }"#;

const IMPLEMENT_IMPROVEMENT: &str = r#"You implement a code improvement described by a follow-up suggestion.

Keep the original code's style exactly: formatting, indentation, naming conventions, comment and doc style, architectural patterns.
Keep all existing comments and structure; new code uses the same style.

Respond ONLY with a JSON object: { "improved_code": "..." }
improved_code is the complete code with the improvement applied, without markdown or triple backticks."#;

/// Constant system prompt for a capability's backing call
///
/// `persist_code` makes no model call and has no prompt.
pub fn system_prompt(capability: Capability) -> Option<&'static str> {
    match capability {
        Capability::ValidateRequirement => Some(VALIDATE_REQUIREMENT),
        Capability::RefineRequirement => Some(REFINE_REQUIREMENT),
        Capability::ClassifyLanguage => Some(CLASSIFY_LANGUAGE),
        Capability::ExtractFilename => Some(EXTRACT_FILENAME),
        Capability::GenerateCode => Some(GENERATE_CODE),
        Capability::ProposeFollowup => Some(PROPOSE_FOLLOWUP),
        Capability::ImplementImprovement => Some(IMPLEMENT_IMPROVEMENT),
        Capability::PersistCode => None,
    }
}

/// Render labelled input sections, skipping absent ones
pub fn render_input(sections: &[(&str, Option<&str>)]) -> String {
    sections
        .iter()
        .filter_map(|(label, value)| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{}:\n{}", label, v.trim()))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_model_backed_capability_has_a_prompt() {
        for capability in Capability::ALL {
            let prompt = system_prompt(capability);
            assert_eq!(prompt.is_some(), capability != Capability::PersistCode);
        }
    }

    #[test]
    fn test_render_input_skips_empty_sections() {
        let rendered = render_input(&[
            ("Requirement", Some("Add login")),
            ("Repository context", None),
            ("User profile", Some("  ")),
            ("Language", Some("go")),
        ]);
        assert_eq!(rendered, "Requirement:\nAdd login\n\nLanguage:\ngo");
    }
}

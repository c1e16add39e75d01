//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use llamaserve_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Variables are substituted verbatim: HTML escaping is off and a variable
/// referenced by the template but missing from `variables` is an error.
///
/// # Example
/// ```
/// use llamaserve_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("text".to_string(), "What is Rust?".to_string());
///
/// let built = build_prompt(&PromptDefinition::answer(), vars)?;
/// assert!(built.text.starts_with("Question: What is Rust?"));
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let text = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        text,
        source_prompt_id: definition.id.clone(),
        resolved_variables: variables,
    })
}

/// Render a prompt whose only input is the definition's input variable.
pub fn build_input_prompt(definition: &PromptDefinition, input: &str) -> AppResult<BuiltPrompt> {
    let mut variables = HashMap::new();
    variables.insert(definition.input_variable.clone(), input.to_string());
    build_prompt(definition, variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text in, plain text out
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_prompt_exact_text() {
        let built =
            build_input_prompt(&PromptDefinition::answer(), "What is the meaning of life?")
                .unwrap();
        assert_eq!(
            built.text,
            "Question: What is the meaning of life?\nAnswer: Let's think step by step."
        );
        assert_eq!(built.source_prompt_id, "llama.answer");
    }

    #[test]
    fn test_input_is_not_escaped() {
        let built = build_input_prompt(&PromptDefinition::answer(), "<b>\"x\" & {y}</b>").unwrap();
        assert!(built.text.starts_with("Question: <b>\"x\" & {y}</b>\n"));
    }

    #[test]
    fn test_empty_input() {
        let built = build_input_prompt(&PromptDefinition::answer(), "").unwrap();
        assert_eq!(built.text, "Question: \nAnswer: Let's think step by step.");
    }

    #[test]
    fn test_custom_input_variable() {
        let def = PromptDefinition {
            id: "custom".to_string(),
            title: String::new(),
            template: "Q: {{question}}".to_string(),
            input_variable: "question".to_string(),
        };
        let built = build_input_prompt(&def, "why?").unwrap();
        assert_eq!(built.text, "Q: why?");
        assert_eq!(built.resolved_variables["question"], "why?");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let vars = HashMap::new();
        let result = render_template("Question: {{missing}}", &vars);
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_render_invalid_template() {
        let vars = HashMap::new();
        let result = render_template("Question: {{#if}}", &vars);
        assert!(result.is_err());
    }
}

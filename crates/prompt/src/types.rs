//! Prompt types for llamaserve.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of the built-in question/answer prompt.
pub const ANSWER_PROMPT_ID: &str = "llama.answer";

const ANSWER_TEMPLATE: &str = "Question: {{text}}\nAnswer: Let's think step by step.";

/// A prompt definition, built in or loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    #[serde(default)]
    pub title: String,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Name of the template variable that receives the request text
    #[serde(rename = "inputVariable", default = "default_input_variable")]
    pub input_variable: String,
}

fn default_input_variable() -> String {
    "text".to_string()
}

impl PromptDefinition {
    /// The built-in chain-of-thought answer prompt.
    pub fn answer() -> Self {
        Self {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Step-by-step answer".to_string(),
            template: ANSWER_TEMPLATE.to_string(),
            input_variable: default_input_variable(),
        }
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Rendered prompt text
    pub text: String,

    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

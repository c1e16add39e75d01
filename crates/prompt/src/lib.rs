//! Prompt system for llamaserve.
//!
//! This crate provides prompt management with:
//! - The built-in question/answer prompt
//! - YAML-based prompt definitions
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_input_prompt, build_prompt};
pub use loader::{load_prompt_file, resolve_prompt};
pub use types::{BuiltPrompt, PromptDefinition, ANSWER_PROMPT_ID};

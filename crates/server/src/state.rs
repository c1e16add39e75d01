//! Shared application state.

use llamaserve_core::LlmSettings;
use llamaserve_llm::LlmClient;
use llamaserve_prompt::PromptDefinition;
use std::sync::Arc;

/// Sampling parameters applied to every answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_new_tokens: u32,
    pub temperature: f32,
    /// Fixed seed for reproducible answers; `None` draws one per request
    pub seed: Option<u64>,
}

impl GenerationSettings {
    /// The seed for the next request.
    pub fn next_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.2,
            seed: None,
        }
    }
}

impl From<&LlmSettings> for GenerationSettings {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            max_new_tokens: settings.max_new_tokens,
            temperature: settings.temperature,
            seed: settings.seed,
        }
    }
}

/// The model handle and prompt, created once at startup and shared by all requests.
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub prompt: PromptDefinition,
    pub generation: GenerationSettings,
}

impl AppState {
    /// State with the built-in answer prompt and default sampling.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompt: PromptDefinition::answer(),
            generation: GenerationSettings::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }
}

pub type SharedState = Arc<AppState>;

//! LLM provider factory.
//!
//! Builds the LLM client named by the application configuration. For the
//! `gguf` provider this loads the model weights, so it is called once at
//! startup.

use crate::client::LlmClient;
use crate::providers::{GgufClient, OllamaClient};
use llamaserve_core::{AppError, AppResult, LlmSettings};
use std::sync::Arc;

/// Create an LLM client from settings.
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - Model or tokenizer files cannot be loaded
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "gguf" => {
            tracing::info!("Loading GGUF model from {:?}", settings.model_path);
            let client = GgufClient::load(&settings.model_path, &settings.tokenizer_path)?;
            Ok(Arc::new(client))
        }
        "ollama" => {
            tracing::info!(
                "Using Ollama model '{}' at {}",
                settings.model,
                settings.endpoint
            );
            let client = OllamaClient::with_base_url(&settings.endpoint, &settings.model);
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!(
            "Unknown provider: {}",
            settings.provider
        ))),
    }
}

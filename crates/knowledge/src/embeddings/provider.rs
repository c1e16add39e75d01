//! Embedding provider trait and factory.

use super::providers::{BertProvider, OllamaProvider, TrigramProvider};
use llamaserve_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Dimension of the trigram embedder when none is requested.
pub const DEFAULT_TRIGRAM_DIMENSIONS: usize = 384;

/// Dimension expected from Ollama models when none is requested.
pub const DEFAULT_OLLAMA_DIMENSIONS: usize = 768;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const KNOWN_KWARGS: [&str; 4] = ["dimensions", "base_url", "device", "max_length"];

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama", "bert")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from a model name and its options.
///
/// - `trigram` / `trigram-v1`: deterministic local embedder (`dimensions`)
/// - `ollama:<model>`: Ollama embeddings API (`base_url`, `dimensions`)
/// - anything else: a local sentence-transformer directory loaded with
///   candle (`device`, `max_length`)
pub fn create_embedding(
    model_name: &str,
    model_kwargs: &Map<String, Value>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    for key in model_kwargs.keys() {
        if !KNOWN_KWARGS.contains(&key.as_str()) {
            tracing::warn!("Ignoring unknown embedding option '{}'", key);
        }
    }

    match model_name {
        "trigram" | "trigram-v1" => {
            let dimensions =
                kwarg_usize(model_kwargs, "dimensions")?.unwrap_or(DEFAULT_TRIGRAM_DIMENSIONS);
            if dimensions == 0 {
                return Err(AppError::InvalidArgument(
                    "dimensions must be positive".to_string(),
                ));
            }
            Ok(Arc::new(TrigramProvider::new(dimensions)))
        }

        name if name.starts_with("ollama:") => {
            let model = &name["ollama:".len()..];
            if model.is_empty() {
                return Err(AppError::InvalidArgument(
                    "ollama embedding model name is empty".to_string(),
                ));
            }
            let base_url = kwarg_str(model_kwargs, "base_url")?.unwrap_or(DEFAULT_OLLAMA_URL);
            let dimensions =
                kwarg_usize(model_kwargs, "dimensions")?.unwrap_or(DEFAULT_OLLAMA_DIMENSIONS);
            Ok(Arc::new(OllamaProvider::new(base_url, model, dimensions)))
        }

        path => {
            let device = kwarg_str(model_kwargs, "device")?.unwrap_or("cpu");
            let max_length = kwarg_usize(model_kwargs, "max_length")?;
            let provider = BertProvider::load(Path::new(path), device, max_length)?;
            Ok(Arc::new(provider))
        }
    }
}

fn kwarg_usize(kwargs: &Map<String, Value>, key: &str) -> AppResult<Option<usize>> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "Embedding option '{}' must be a non-negative integer, got {}",
                    key, value
                ))
            }),
    }
}

fn kwarg_str<'a>(kwargs: &'a Map<String, Value>, key: &str) -> AppResult<Option<&'a str>> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(value) => Err(AppError::InvalidArgument(format!(
            "Embedding option '{}' must be a string, got {}",
            key, value
        ))),
    }
}

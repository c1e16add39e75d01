//! Local sentence-transformer embeddings with candle.
//!
//! Expects a model directory laid out like a Hugging Face checkout:
//! `config.json`, `tokenizer.json` and `model.safetensors`. Embeddings are the
//! attention-masked mean of the last hidden state, L2-normalised.

use crate::embeddings::provider::EmbeddingProvider;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use llamaserve_core::{AppError, AppResult};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;

const DEFAULT_MAX_LENGTH: usize = 256;

pub struct BertProvider {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    dimensions: usize,
    max_length: usize,
}

impl fmt::Debug for BertProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BertProvider")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .field("max_length", &self.max_length)
            .finish()
    }
}

fn embedding_err(e: impl fmt::Display) -> AppError {
    AppError::Embedding(e.to_string())
}

fn parse_device(name: &str) -> AppResult<Device> {
    match name {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0)
            .map_err(|e| AppError::Embedding(format!("CUDA device unavailable: {}", e))),
        "metal" | "mps" => Device::new_metal(0)
            .map_err(|e| AppError::Embedding(format!("Metal device unavailable: {}", e))),
        other => Err(AppError::InvalidArgument(format!(
            "Unknown device '{}'; expected cpu, cuda or metal",
            other
        ))),
    }
}

impl BertProvider {
    /// Load a model directory onto `device`.
    pub fn load(model_dir: &Path, device: &str, max_length: Option<usize>) -> AppResult<Self> {
        let start = Instant::now();
        let device = parse_device(device)?;

        if !model_dir.is_dir() {
            return Err(AppError::Embedding(format!(
                "Embedding model directory not found: {:?}",
                model_dir
            )));
        }

        let config_path = model_dir.join("config.json");
        let config_text = std::fs::read_to_string(&config_path)
            .map_err(|e| AppError::Embedding(format!("Failed to read {:?}: {}", config_path, e)))?;
        let raw_config: serde_json::Value = serde_json::from_str(&config_text)?;
        let config: BertConfig = serde_json::from_value(raw_config.clone())?;
        let dimensions = raw_config
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                AppError::Embedding(format!("{:?} has no hidden_size", config_path))
            })? as usize;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            AppError::Embedding(format!("Failed to load tokenizer {:?}: {}", tokenizer_path, e))
        })?;

        let weights_path = model_dir.join("model.safetensors");
        let tensors = candle_core::safetensors::load(&weights_path, &device).map_err(|e| {
            AppError::Embedding(format!("Failed to load weights {:?}: {}", weights_path, e))
        })?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(embedding_err)?;

        let model_name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| model_dir.to_string_lossy().to_string());

        tracing::info!(
            "Loaded embedding model {} ({} dims) in {:.2}s",
            model_name,
            dimensions,
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            model_name,
            dimensions,
            max_length: max_length.filter(|l| *l > 0).unwrap_or(DEFAULT_MAX_LENGTH),
        })
    }

    fn embed_text(&self, text: &str) -> AppResult<Vec<f32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(embedding_err)?;
        let mut ids = encoding.get_ids().to_vec();
        let mut mask = encoding.get_attention_mask().to_vec();
        ids.truncate(self.max_length);
        mask.truncate(self.max_length);

        let input_ids = Tensor::new(ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(embedding_err)?;
        let attention_mask = Tensor::new(mask.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(embedding_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(embedding_err)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(embedding_err)?;

        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(embedding_err)?;
        pooled
            .squeeze(0)
            .and_then(|t| t.to_device(&Device::Cpu))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(embedding_err)
    }
}

/// Mean of `hidden` `[B, T, H]` over the unmasked positions, scaled to unit length.
pub(crate) fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .to_device(hidden.device())?
        .to_dtype(hidden.dtype())?
        .unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let lengths = mask.sum(1)?;
    let mean = summed.broadcast_div(&lengths)?;

    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
    let eps = Tensor::new(&[1e-12f32], hidden.device())?
        .to_dtype(hidden.dtype())?
        .unsqueeze(0)?;
    mean.broadcast_div(&norm.broadcast_add(&eps)?)
}

#[async_trait::async_trait]
impl EmbeddingProvider for BertProvider {
    fn provider_name(&self) -> &str {
        "bert"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_text(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_masked_mean_ignores_padding() {
        // one sequence, three positions, two hidden dims; last position is padding
        let hidden = Tensor::new(
            &[[[1.0f32, 0.0], [3.0, 0.0], [100.0, 100.0]]],
            &Device::Cpu,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &Device::Cpu).unwrap();

        let pooled = masked_mean_l2(&hidden, &mask).unwrap();
        let values = pooled.squeeze(0).unwrap().to_vec1::<f32>().unwrap();
        assert!((values[0] - 1.0).abs() < 1e-5);
        assert!(values[1].abs() < 1e-5);
    }

    #[test]
    fn test_unknown_device() {
        let err = parse_device("tpu").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_missing_directory() {
        let result = BertProvider::load(Path::new("/nonexistent/model"), "cpu", None);
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_directory_without_config() {
        let temp = TempDir::new().unwrap();
        let err = BertProvider::load(temp.path(), "cpu", None).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }
}

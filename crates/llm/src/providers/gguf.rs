//! In-process GGUF provider.
//!
//! Loads quantized llama weights once with candle and generates completions
//! on the blocking thread pool. The weights carry a KV cache that `forward`
//! mutates, so all requests share one handle behind a mutex and run one at a
//! time.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::device::select_device;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use llamaserve_core::{AppError, AppResult};
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokenizers::Tokenizer;

/// End-of-sequence token used by llama-family tokenizers.
const EOS_TOKEN: &str = "</s>";

const DEFAULT_MAX_TOKENS: u32 = 256;

/// One decoding step of a causal language model.
///
/// `forward` receives the token ids for positions starting at `index_pos` and
/// returns the logits for the last position, shaped `(1, vocab)`.
pub trait Forward {
    fn forward(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor>;
}

impl Forward for ModelWeights {
    fn forward(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
        ModelWeights::forward(self, input, index_pos)
    }
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub tokens: Vec<u32>,
    pub hit_eos: bool,
}

/// GGUF-backed LLM client.
pub struct GgufClient {
    model_name: String,
    model: Arc<Mutex<ModelWeights>>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    eos_token: Option<u32>,
}

impl GgufClient {
    /// Load quantized weights and the matching tokenizer.
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> AppResult<Self> {
        let start = Instant::now();
        let device = select_device();

        let mut file = std::fs::File::open(model_path).map_err(|e| {
            AppError::Llm(format!("Failed to open model file {:?}: {}", model_path, e))
        })?;

        let content = gguf_file::Content::read(&mut file).map_err(|e| {
            AppError::Llm(format!("Failed to read GGUF file {:?}: {}", model_path, e))
        })?;

        let tensor_count = content.tensor_infos.len();
        let model = ModelWeights::from_gguf(content, &mut file, &device).map_err(|e| {
            AppError::Llm(format!("Failed to load weights from {:?}: {}", model_path, e))
        })?;

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            AppError::Llm(format!(
                "Failed to load tokenizer {:?}: {}",
                tokenizer_path, e
            ))
        })?;
        let eos_token = tokenizer.token_to_id(EOS_TOKEN);
        if eos_token.is_none() {
            tracing::warn!("Tokenizer has no {} token; generation stops only at the token limit", EOS_TOKEN);
        }

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "gguf".to_string());

        tracing::info!(
            "Loaded {} ({} tensors) in {:.2}s",
            model_name,
            tensor_count,
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            model_name,
            model: Arc::new(Mutex::new(model)),
            tokenizer: Arc::new(tokenizer),
            device,
            eos_token,
        })
    }
}

fn llm_err(e: impl Display) -> AppError {
    AppError::Llm(e.to_string())
}

/// Run autoregressive decoding from `prompt_tokens`.
///
/// The whole prompt is fed at position 0, then one sampled token at a time.
/// Stops after `max_tokens` tokens or when `eos_token` is sampled; the EOS
/// token itself is not returned.
pub fn generate_tokens<M: Forward>(
    model: &mut M,
    device: &Device,
    prompt_tokens: &[u32],
    max_tokens: usize,
    eos_token: Option<u32>,
    logits_processor: &mut LogitsProcessor,
) -> AppResult<Generation> {
    if prompt_tokens.is_empty() {
        return Err(AppError::Llm("Prompt encoded to zero tokens".to_string()));
    }

    let mut tokens = Vec::with_capacity(max_tokens);
    if max_tokens == 0 {
        return Ok(Generation {
            tokens,
            hit_eos: false,
        });
    }

    let input = Tensor::new(prompt_tokens, device)
        .and_then(|t| t.unsqueeze(0))
        .map_err(llm_err)?;
    let logits = model
        .forward(&input, 0)
        .and_then(|l| l.squeeze(0))
        .map_err(llm_err)?;
    let mut next = logits_processor.sample(&logits).map_err(llm_err)?;

    loop {
        if Some(next) == eos_token {
            return Ok(Generation {
                tokens,
                hit_eos: true,
            });
        }

        tokens.push(next);
        if tokens.len() >= max_tokens {
            return Ok(Generation {
                tokens,
                hit_eos: false,
            });
        }

        let input = Tensor::new(&[next], device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(llm_err)?;
        let index_pos = prompt_tokens.len() + tokens.len() - 1;
        let logits = model
            .forward(&input, index_pos)
            .and_then(|l| l.squeeze(0))
            .map_err(llm_err)?;
        next = logits_processor.sample(&logits).map_err(llm_err)?;
    }
}

/// Build a sampler; a non-positive temperature selects greedy decoding and a
/// missing seed draws a random one.
fn logits_processor(request: &LlmRequest) -> LogitsProcessor {
    let temperature = request
        .temperature
        .map(f64::from)
        .filter(|t| *t > 0.0);
    LogitsProcessor::new(request.seed.unwrap_or_else(rand::random), temperature, None)
}

#[async_trait::async_trait]
impl LlmClient for GgufClient {
    fn provider_name(&self) -> &str {
        "gguf"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Request: {:?}", request);

        let model = Arc::clone(&self.model);
        let tokenizer = Arc::clone(&self.tokenizer);
        let device = self.device.clone();
        let eos_token = self.eos_token;
        let request = request.clone();

        let (content, usage, done) = tokio::task::spawn_blocking(move || {
            let encoding = tokenizer.encode(request.prompt.as_str(), true).map_err(llm_err)?;
            let prompt_tokens = encoding.get_ids().to_vec();
            let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS) as usize;
            let mut sampler = logits_processor(&request);

            let generation = {
                let mut weights = model
                    .lock()
                    .map_err(|_| AppError::Llm("Model handle is poisoned".to_string()))?;
                generate_tokens(
                    &mut *weights,
                    &device,
                    &prompt_tokens,
                    max_tokens,
                    eos_token,
                    &mut sampler,
                )?
            };

            let content = tokenizer
                .decode(&generation.tokens, true)
                .map_err(llm_err)?;
            let usage = LlmUsage::new(prompt_tokens.len() as u32, generation.tokens.len() as u32);

            Ok::<_, AppError>((content, usage, generation.hit_eos))
        })
        .await
        .map_err(|e| AppError::Llm(format!("Inference task failed: {}", e)))??;

        tracing::debug!(
            "Generated {} tokens (prompt {})",
            usage.completion_tokens,
            usage.prompt_tokens
        );

        Ok(LlmResponse {
            content,
            model: self.model_name.clone(),
            usage,
            done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: usize = 8;

    /// Emits a fixed token sequence and records the positions it was called with.
    struct ScriptedModel {
        script: Vec<u32>,
        step: usize,
        positions: Vec<usize>,
    }

    impl ScriptedModel {
        fn new(script: Vec<u32>) -> Self {
            Self {
                script,
                step: 0,
                positions: Vec::new(),
            }
        }
    }

    impl Forward for ScriptedModel {
        fn forward(&mut self, _input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
            self.positions.push(index_pos);
            let token = self.script[self.step.min(self.script.len() - 1)] as usize;
            self.step += 1;
            let mut logits = vec![0f32; VOCAB];
            logits[token] = 10.0;
            Tensor::new(logits.as_slice(), &Device::Cpu)?.unsqueeze(0)
        }
    }

    fn greedy() -> LogitsProcessor {
        LogitsProcessor::new(0, None, None)
    }

    #[test]
    fn test_generation_stops_at_eos() {
        let mut model = ScriptedModel::new(vec![3, 4, 5, 2, 6]);
        let generation =
            generate_tokens(&mut model, &Device::Cpu, &[1, 7, 7], 16, Some(2), &mut greedy())
                .unwrap();

        assert_eq!(generation.tokens, vec![3, 4, 5]);
        assert!(generation.hit_eos);
        // prompt at 0, then one position per generated token
        assert_eq!(model.positions, vec![0, 3, 4, 5]);
    }

    #[test]
    fn test_generation_respects_token_limit() {
        let mut model = ScriptedModel::new(vec![3, 3, 3, 3, 3, 3]);
        let generation =
            generate_tokens(&mut model, &Device::Cpu, &[1], 4, Some(2), &mut greedy()).unwrap();

        assert_eq!(generation.tokens.len(), 4);
        assert!(!generation.hit_eos);
    }

    #[test]
    fn test_generation_rejects_empty_prompt() {
        let mut model = ScriptedModel::new(vec![3]);
        let result = generate_tokens(&mut model, &Device::Cpu, &[], 4, None, &mut greedy());
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[test]
    fn test_zero_temperature_is_greedy() {
        let request = LlmRequest::new("x").with_temperature(0.0);
        let mut sampler = logits_processor(&request);
        let logits = Tensor::new(&[0.1f32, 5.0, 0.2], &Device::Cpu).unwrap();
        assert_eq!(sampler.sample(&logits).unwrap(), 1);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let request = LlmRequest::new("x").with_temperature(1.0).with_seed(9);
        let logits = Tensor::new(&[1.0f32, 1.1, 0.9, 1.05], &Device::Cpu).unwrap();

        let draw = || {
            let mut sampler = logits_processor(&request);
            (0..8)
                .map(|_| sampler.sample(&logits).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn test_load_missing_model_file() {
        let result = GgufClient::load(
            Path::new("/nonexistent/model.gguf"),
            Path::new("/nonexistent/tokenizer.json"),
        );
        match result {
            Err(AppError::Llm(msg)) => assert!(msg.contains("Failed to open model file")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected failure for a missing model"),
        }
    }
}

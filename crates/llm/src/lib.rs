//! LLM integration crate for llamaserve.
//!
//! This crate provides a provider-agnostic abstraction for generating text
//! with a language model.
//!
//! # Providers
//! - **gguf**: quantized llama weights loaded in-process with candle (default)
//! - **ollama**: a local Ollama runtime
//!
//! # Example
//! ```no_run
//! use llamaserve_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("llama2");
//! let request = LlmRequest::new("Hello, world!").with_max_tokens(32);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod device;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{GgufClient, OllamaClient};

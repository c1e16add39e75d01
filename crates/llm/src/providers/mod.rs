//! LLM provider implementations.

pub mod gguf;
pub mod ollama;

pub use gguf::GgufClient;
pub use ollama::OllamaClient;

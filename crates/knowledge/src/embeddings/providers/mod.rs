//! Embedding provider implementations.

pub mod bert;
pub mod ollama;
pub mod trigram;

pub use bert::BertProvider;
pub use ollama::OllamaProvider;
pub use trigram::TrigramProvider;

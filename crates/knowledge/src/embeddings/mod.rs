//! Embedding providers for the index builder.
//!
//! A provider turns chunk text into fixed-length vectors. The same provider
//! (same model, same dimensions) must be used to build an index and to query
//! it.

pub mod provider;
pub mod providers;

pub use provider::{create_embedding, EmbeddingProvider};

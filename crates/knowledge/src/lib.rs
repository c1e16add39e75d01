//! Index builder for llamaserve.
//!
//! Loads documents from a file or directory, splits them into fixed-size
//! chunks, embeds each chunk and persists the vectors as a local index that
//! can be reloaded for similarity search.
//!
//! # Example
//! ```no_run
//! use llamaserve_knowledge::{IndexBuilder, IndexBuilderConfig, LoadType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IndexBuilderConfig::new("docs", LoadType::FileDirectory, "trigram", "vectordb")
//!     .with_file_glob("**/*.md")
//!     .with_chunk_size(Some(500));
//! let stats = IndexBuilder::new(&config).build().await?;
//! println!("{} chunks indexed", stats.chunks);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod embeddings;
pub mod loader;
pub mod splitter;
pub mod types;
pub mod vector_index;
pub mod vector_store;


// Re-export commonly used types
pub use builder::IndexBuilder;
pub use embeddings::{create_embedding, EmbeddingProvider};
pub use types::{
    Chunk, Document, IndexBuilderConfig, IndexStats, LoadType, StoredChunk, ALLOWED_GLOBS,
    DEFAULT_CHUNK_SIZE,
};
pub use vector_index::VectorIndex;
pub use vector_store::{IndexMeta, VectorStore};

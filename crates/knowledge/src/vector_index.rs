//! Vector index abstraction.

use crate::types::StoredChunk;
use llamaserve_core::AppResult;

/// Trait for vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Insert a chunk with its embedding, replacing any chunk with the same id.
    fn upsert(&mut self, chunk: StoredChunk, embedding: Vec<f32>) -> AppResult<()>;

    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns chunks ordered by descending similarity score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(StoredChunk, f32)>>;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every chunk.
    fn reset(&mut self);
}

//! Index builder: load, split, embed and persist.

use crate::embeddings::{self, EmbeddingProvider};
use crate::loader;
use crate::splitter;
use crate::types::{
    validate_file_glob, Chunk, Document, IndexBuilderConfig, IndexStats, LoadType, StoredChunk,
};
use crate::vector_index::VectorIndex;
use crate::vector_store::VectorStore;
use llamaserve_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Number of chunks sent to the embedding provider per call.
const EMBED_BATCH_SIZE: usize = 64;

/// Runs one index build described by an [`IndexBuilderConfig`].
pub struct IndexBuilder<'a> {
    config: &'a IndexBuilderConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a IndexBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexBuilderConfig {
        self.config
    }

    /// Load the configured source.
    ///
    /// Directory loads check the glob whitelist before any filesystem access.
    pub fn load_document(&self) -> AppResult<Vec<Document>> {
        if self.config.load_type == LoadType::FileDirectory {
            validate_file_glob(self.config.file_glob.as_deref())?;
        }

        let documents = loader::load(
            self.config.load_type,
            &self.config.source_path,
            self.config.file_glob.as_deref(),
        )?;

        tracing::info!(
            "Loaded {} documents from {:?} ({})",
            documents.len(),
            self.config.source_path,
            self.config.load_type
        );
        Ok(documents)
    }

    /// Split documents at the configured chunk size with no overlap.
    pub fn text_splitter(&self, documents: &[Document]) -> Vec<Chunk> {
        splitter::split_documents(documents, self.config.chunk_size)
    }

    /// Build an embedding provider. Stateless; only local models touch disk.
    pub fn create_embedding(
        model_name: &str,
        model_kwargs: &Map<String, Value>,
    ) -> AppResult<Arc<dyn EmbeddingProvider>> {
        embeddings::create_embedding(model_name, model_kwargs)
    }

    /// Embed `chunks` and write a fresh index to the output directory.
    pub async fn create_vectorstore(
        &self,
        chunks: &[Chunk],
        embeddings: &dyn EmbeddingProvider,
    ) -> AppResult<IndexStats> {
        let start = Instant::now();

        if chunks.is_empty() {
            return Err(AppError::Index("No chunks to index".to_string()));
        }

        let mut store = VectorStore::new(embeddings);
        for (batch_index, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embeddings.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (offset, (chunk, vector)) in batch.iter().zip(vectors).enumerate() {
                let position = (batch_index * EMBED_BATCH_SIZE + offset) as u32;
                let stored = StoredChunk {
                    id: uuid::Uuid::new_v4().to_string(),
                    position,
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                };
                store.upsert(stored, vector)?;
            }

            tracing::debug!(
                "Embedded {}/{} chunks",
                batch_index * EMBED_BATCH_SIZE + batch.len(),
                chunks.len()
            );
        }

        store.save_local(&self.config.output_dir)?;

        let documents = chunks
            .iter()
            .map(|c| c.document_index)
            .collect::<HashSet<_>>()
            .len();

        Ok(IndexStats {
            documents,
            chunks: store.len(),
            dimensions: embeddings.dimensions(),
            output_dir: self.config.output_dir.clone(),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Full pipeline: load, split, embed, persist.
    pub async fn build(&self) -> AppResult<IndexStats> {
        let start = Instant::now();

        let documents = self.load_document()?;
        let chunks = self.text_splitter(&documents);
        tracing::info!(
            "Split {} documents into {} chunks (chunk size {})",
            documents.len(),
            chunks.len(),
            self.config.chunk_size
        );

        let provider = Self::create_embedding(&self.config.model_name, &self.config.model_kwargs)?;
        tracing::info!(
            "Embedding with {} (model: {}, {} dims)",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions()
        );

        let mut stats = self.create_vectorstore(&chunks, provider.as_ref()).await?;
        stats.documents = documents.len();
        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Index build completed: {} documents, {} chunks in {:.2}s",
            stats.documents,
            stats.chunks,
            stats.duration_secs
        );
        Ok(stats)
    }
}

//! In-memory vector store persisted as a SQLite file.
//!
//! The store keeps every embedding in memory and answers queries by
//! exhaustive cosine similarity. `save_local` writes `index.sqlite` into a
//! directory, `load_local` reads it back.

use crate::embeddings::EmbeddingProvider;
use crate::types::StoredChunk;
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use llamaserve_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the index inside its directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Identity of the embedding model an index was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    meta: IndexMeta,
    chunks: Vec<StoredChunk>,
    embeddings: Vec<Vec<f32>>,
}

fn index_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Index(format!("{}: {}", context, e))
}

impl VectorStore {
    /// Create an empty store for embeddings from `provider`.
    pub fn new(provider: &dyn EmbeddingProvider) -> Self {
        Self {
            meta: IndexMeta {
                provider: provider.provider_name().to_string(),
                model: provider.model_name().to_string(),
                dimensions: provider.dimensions(),
                created_at: Utc::now(),
            },
            chunks: Vec::new(),
            embeddings: Vec::new(),
        }
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    /// Path of the index file inside `dir`.
    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Top-k chunks by descending cosine similarity.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Vec<(StoredChunk, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| (i, cosine_similarity(query, embedding)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (self.chunks[i].clone(), score))
            .collect()
    }

    /// Embed `query` with `provider`, then search.
    ///
    /// The provider must be the one the index was built with.
    pub async fn similarity_search_text(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<(StoredChunk, f32)>> {
        if provider.model_name() != self.meta.model || provider.dimensions() != self.meta.dimensions
        {
            return Err(AppError::Index(format!(
                "Index was built with {} ({} dims), query provider is {} ({} dims)",
                self.meta.model,
                self.meta.dimensions,
                provider.model_name(),
                provider.dimensions()
            )));
        }

        let embedding = provider.embed(query).await?;
        Ok(self.similarity_search(&embedding, k))
    }

    /// Write the store to `dir/index.sqlite`, replacing any existing index.
    ///
    /// The file is written next to the target and renamed into place, so a
    /// failed save leaves the previous index intact.
    pub fn save_local(&self, dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Index(format!("Failed to create index directory {:?}: {}", dir, e))
        })?;

        let target = Self::index_path(dir);
        let staging = dir.join(format!("{}.tmp", INDEX_FILE));
        if staging.exists() {
            std::fs::remove_file(&staging)?;
        }

        {
            let mut conn =
                Connection::open(&staging).map_err(index_err("Failed to create index file"))?;
            conn.execute_batch(
                r#"
                CREATE TABLE meta (
                    provider TEXT NOT NULL,
                    model TEXT NOT NULL,
                    dimensions INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE chunks (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    embedding BLOB NOT NULL,
                    metadata TEXT NOT NULL
                );
                "#,
            )
            .map_err(index_err("Failed to create tables"))?;

            let tx = conn
                .transaction()
                .map_err(index_err("Failed to start transaction"))?;

            tx.execute(
                "INSERT INTO meta (provider, model, dimensions, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.meta.provider,
                    self.meta.model,
                    self.meta.dimensions as i64,
                    self.meta.created_at.to_rfc3339(),
                ],
            )
            .map_err(index_err("Failed to write index metadata"))?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO chunks (id, position, text, embedding, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(index_err("Failed to prepare insert"))?;

                for (chunk, embedding) in self.chunks.iter().zip(&self.embeddings) {
                    let metadata = serde_json::to_string(&chunk.metadata)?;
                    stmt.execute(params![
                        chunk.id,
                        chunk.position as i64,
                        chunk.text,
                        embedding_to_bytes(embedding),
                        metadata,
                    ])
                    .map_err(index_err("Failed to insert chunk"))?;
                }
            }

            tx.commit().map_err(index_err("Failed to commit index"))?;
        }

        std::fs::rename(&staging, &target).map_err(|e| {
            AppError::Index(format!("Failed to move index into {:?}: {}", target, e))
        })?;

        tracing::info!("Saved {} chunks to {:?}", self.chunks.len(), target);
        Ok(())
    }

    /// Read a store previously written by `save_local`.
    pub fn load_local(dir: &Path) -> AppResult<Self> {
        let path = Self::index_path(dir);
        if !path.exists() {
            return Err(AppError::Index(format!("No index found at {:?}", path)));
        }

        let conn = Connection::open(&path).map_err(index_err("Failed to open index"))?;

        let (provider, model, dimensions, created_at): (String, String, i64, String) = conn
            .query_row(
                "SELECT provider, model, dimensions, created_at FROM meta LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(index_err("Failed to read index metadata"))?;

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AppError::Index(format!("Invalid created_at in index: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT id, position, text, embedding, metadata FROM chunks ORDER BY position")
            .map_err(index_err("Failed to prepare query"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(index_err("Failed to query chunks"))?;

        let mut store = Self {
            meta: IndexMeta {
                provider,
                model,
                dimensions: dimensions as usize,
                created_at,
            },
            chunks: Vec::new(),
            embeddings: Vec::new(),
        };

        for row in rows {
            let (id, position, text, embedding, metadata) =
                row.map_err(index_err("Failed to read chunk"))?;
            let chunk = StoredChunk {
                id,
                position: position as u32,
                text,
                metadata: serde_json::from_str(&metadata)?,
            };
            store.upsert(chunk, bytes_to_embedding(&embedding)?)?;
        }

        tracing::debug!("Loaded {} chunks from {:?}", store.len(), path);
        Ok(store)
    }
}

impl VectorIndex for VectorStore {
    fn upsert(&mut self, chunk: StoredChunk, embedding: Vec<f32>) -> AppResult<()> {
        if embedding.len() != self.meta.dimensions {
            return Err(AppError::Index(format!(
                "Embedding for chunk {} has {} dimensions, index expects {}",
                chunk.id,
                embedding.len(),
                self.meta.dimensions
            )));
        }

        match self.chunks.iter().position(|c| c.id == chunk.id) {
            Some(i) => {
                self.chunks[i] = chunk;
                self.embeddings[i] = embedding;
            }
            None => {
                self.chunks.push(chunk);
                self.embeddings.push(embedding);
            }
        }
        Ok(())
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(StoredChunk, f32)>> {
        if query_embedding.len() != self.meta.dimensions {
            return Err(AppError::Index(format!(
                "Query has {} dimensions, index expects {}",
                query_embedding.len(),
                self.meta.dimensions
            )));
        }
        Ok(self.similarity_search(query_embedding, top_k))
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn reset(&mut self) {
        self.chunks.clear();
        self.embeddings.clear();
    }
}

/// Little-endian f32 bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use serde_json::Map;
    use tempfile::TempDir;

    fn chunk(id: &str, position: u32, text: &str) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            position,
            text: text.to_string(),
            metadata: Map::new(),
        }
    }

    fn store_with(entries: &[(&str, Vec<f32>)]) -> VectorStore {
        let mut store = VectorStore::new(&TrigramProvider::new(3));
        for (i, (id, embedding)) in entries.iter().enumerate() {
            store
                .upsert(chunk(id, i as u32, id), embedding.clone())
                .unwrap();
        }
        store
    }

    #[test]
    fn test_search_orders_by_score() {
        let store = store_with(&[
            ("x", vec![1.0, 0.0, 0.0]),
            ("y", vec![0.0, 1.0, 0.0]),
            ("xy", vec![0.7, 0.7, 0.0]),
        ]);

        let results = store.search(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "x");
        assert_eq!(results[1].0.id, "xy");
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_upsert_replaces_and_checks_dimensions() {
        let mut store = store_with(&[("a", vec![1.0, 0.0, 0.0])]);
        store
            .upsert(chunk("a", 0, "replaced"), vec![0.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.chunks()[0].text, "replaced");

        let err = store.upsert(chunk("b", 1, "b"), vec![1.0]).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));

        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load_local() {
        let temp = TempDir::new().unwrap();
        let mut store = store_with(&[("a", vec![1.0, 0.0, 0.0]), ("b", vec![0.0, 1.0, 0.0])]);
        store.chunks[1]
            .metadata
            .insert("source".to_string(), "b.txt".into());

        store.save_local(temp.path()).unwrap();
        let loaded = VectorStore::load_local(temp.path()).unwrap();

        assert_eq!(loaded.meta(), store.meta());
        assert_eq!(loaded.chunks(), store.chunks());
        assert_eq!(loaded.embeddings, store.embeddings);
    }

    #[test]
    fn test_save_replaces_existing_index() {
        let temp = TempDir::new().unwrap();
        store_with(&[("old1", vec![1.0, 0.0, 0.0]), ("old2", vec![0.0, 1.0, 0.0])])
            .save_local(temp.path())
            .unwrap();
        store_with(&[("new", vec![0.0, 0.0, 1.0])])
            .save_local(temp.path())
            .unwrap();

        let loaded = VectorStore::load_local(temp.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.chunks()[0].id, "new");
        assert!(!temp.path().join("index.sqlite.tmp").exists());
    }

    #[test]
    fn test_load_missing_index() {
        let temp = TempDir::new().unwrap();
        let err = VectorStore::load_local(temp.path()).unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[tokio::test]
    async fn test_text_search_rejects_other_model() {
        let store = store_with(&[("a", vec![1.0, 0.0, 0.0])]);
        let other = TrigramProvider::new(384);
        let err = store
            .similarity_search_text(&other, "anything", 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn test_embedding_bytes() {
        let embedding = vec![0.25f32, -1.5, 3.0];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), embedding);
        assert!(bytes_to_embedding(&bytes[..5]).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

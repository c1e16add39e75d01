//! Fixed-size, non-overlapping document splitting using the text-splitter crate.

use crate::types::{Chunk, Document};
use serde_json::Value;
use text_splitter::TextSplitter;

/// Split every document into chunks of at most `chunk_size` characters.
///
/// Chunks keep their document's metadata, with `start_index` holding the
/// byte offset of the chunk in the document. Whitespace-only chunks are
/// dropped. The output depends only on the input, so re-splitting the same
/// documents yields the same sequence.
pub fn split_documents(documents: &[Document], chunk_size: usize) -> Vec<Chunk> {
    let splitter = TextSplitter::new(chunk_size.max(1));

    let mut chunks = Vec::new();
    for (document_index, document) in documents.iter().enumerate() {
        let mut position = 0u32;
        for (offset, text) in splitter.chunk_indices(&document.page_content) {
            if text.trim().is_empty() {
                continue;
            }

            let mut metadata = document.metadata.clone();
            metadata.insert("start_index".to_string(), Value::from(offset));

            chunks.push(Chunk {
                document_index,
                position,
                text: text.to_string(),
                metadata,
            });
            position += 1;
        }
    }

    tracing::debug!(
        "Split {} documents into {} chunks (chunk size {})",
        documents.len(),
        chunks.len(),
        chunk_size
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn doc(text: &str) -> Document {
        Document::new(text, Path::new("test.txt"))
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a test sentence. ".repeat(100);
        let chunks = split_documents(&[doc(&text)], 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
            assert_eq!(chunk.metadata["source"], "test.txt");
        }
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let chunks = split_documents(&[doc("short text")], 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].metadata["start_index"], 0);
    }

    #[test]
    fn test_positions_per_document() {
        let docs = vec![doc(&"alpha beta gamma. ".repeat(20)), doc("delta")];
        let chunks = split_documents(&docs, 50);

        let last = chunks.last().unwrap();
        assert_eq!(last.document_index, 1);
        assert_eq!(last.position, 0);
        assert!(chunks.iter().filter(|c| c.document_index == 0).count() > 1);
    }

    #[test]
    fn test_resplit_is_identical() {
        let docs = vec![
            doc(&"Rust is a systems programming language. ".repeat(40)),
            doc("Olá mundo 🎮 com acentuação. ".repeat(30).as_str()),
        ];

        let first = split_documents(&docs, 120);
        let second = split_documents(&docs, 120);
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_document_produces_no_chunks() {
        assert!(split_documents(&[doc("   \n\t ")], 10).is_empty());
    }
}

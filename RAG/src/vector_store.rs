use crate::embedding_service::cosine_similarity;
use crate::models::*;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const INDEX_FILE: &str = "index.json";

/// Exhaustive cosine-similarity index over embedded chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    chunks: Vec<DocumentChunk>,
}

impl VectorStore {
    pub fn from_chunks(chunks: Vec<DocumentChunk>) -> Result<Self> {
        let first = chunks
            .first()
            .ok_or_else(|| anyhow!("Cannot build a vector store from zero chunks"))?;
        let dimension = first
            .embedding
            .as_ref()
            .map(Vec::len)
            .ok_or_else(|| anyhow!("Chunk {} has no embedding", first.id))?;

        let mut store = Self {
            dimension,
            chunks: Vec::with_capacity(chunks.len()),
        };
        store.add_chunks(chunks)?;
        Ok(store)
    }

    pub fn add_chunks(&mut self, chunks: Vec<DocumentChunk>) -> Result<()> {
        for chunk in &chunks {
            match &chunk.embedding {
                Some(embedding) if embedding.len() == self.dimension => {}
                Some(embedding) => {
                    return Err(anyhow!(
                        "Chunk {} has embedding dimension {}, index expects {}",
                        chunk.id,
                        embedding.len(),
                        self.dimension
                    ))
                }
                None => return Err(anyhow!("Chunk {} has no embedding", chunk.id)),
            }
        }

        self.chunks.extend(chunks);
        Ok(())
    }

    /// Returns the `k` most similar chunks, best first. Equal scores keep insertion order.
    pub fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(DocumentChunk, f32)>> {
        if query_embedding.len() != self.dimension {
            return Err(anyhow!(
                "Query embedding dimension {} does not match index dimension {}",
                query_embedding.len(),
                self.dimension
            ));
        }

        let mut chunk_scores: Vec<(&DocumentChunk, f32)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                chunk
                    .embedding
                    .as_ref()
                    .map(|embedding| (chunk, cosine_similarity(query_embedding, embedding)))
            })
            .collect();

        chunk_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let results = chunk_scores
            .into_iter()
            .take(k)
            .map(|(chunk, score)| (chunk.clone(), score))
            .collect::<Vec<_>>();

        log::info!("Found {} relevant chunks", results.len());
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distinct chunk sources in insertion order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for chunk in &self.chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        sources
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(INDEX_FILE);
        let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));
        let json = serde_json::to_vec(self)?;
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move index into {}", path.display()))?;

        log::info!("Vector store saved to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            log::warn!("No vector store found at {}.", dir.display());
            return Ok(None);
        }

        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let store: VectorStore = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt vector store at {}", path.display()))?;

        log::info!(
            "Vector store loaded from {} ({} chunks)",
            dir.display(),
            store.len()
        );
        Ok(Some(store))
    }
}

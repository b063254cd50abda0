use crate::config::Settings;
use crate::models::*;
use crate::ollama_service::with_retries;
use anyhow::{anyhow, Result};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;

const PASSAGE_PREFIX: &str = "passage: ";
const QUERY_PREFIX: &str = "query: ";

/// Computes embeddings through Ollama's `/api/embeddings` endpoint.
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    model: String,
    concurrency: usize,
    max_retries: u32,
}

impl EmbeddingService {
    pub fn new(settings: &Settings) -> Result<Self> {
        log::info!("Initializing embedding model {}...", settings.embed_model);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.ollama_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.ollama_url.clone(),
            model: settings.embed_model.clone(),
            concurrency: settings.embed_concurrency.max(1),
            max_retries: settings.ollama_max_retries,
        })
    }

    /// Fills in the embedding of every chunk, keeping chunk order.
    pub async fn embed_documents(&self, chunks: &mut [DocumentChunk]) -> Result<()> {
        log::info!("Generating embeddings for {} chunks...", chunks.len());

        let prompts: Vec<String> = chunks
            .iter()
            .map(|chunk| format!("{}{}", PASSAGE_PREFIX, chunk.content))
            .collect();

        let embeddings: Vec<Vec<f32>> = stream::iter(prompts.into_iter().map(|p| self.embed(p)))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = Some(embedding);
        }

        Ok(())
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(format!("{}{}", QUERY_PREFIX, query)).await
    }

    async fn embed(&self, prompt: String) -> Result<Vec<f32>> {
        with_retries(self.max_retries, "Embedding request", || self.embed_once(&prompt)).await
    }

    async fn embed_once(&self, prompt: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
        };

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama embeddings error ({}): {}", status, error_text));
        }

        let body: OllamaEmbeddingResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(anyhow!(
                "Ollama returned an empty embedding for model {}",
                self.model
            ));
        }

        Ok(body.embedding)
    }
}

pub fn cosine_similarity(embedding1: &[f32], embedding2: &[f32]) -> f32 {
    if embedding1.len() != embedding2.len() {
        return 0.0;
    }

    let dot_product: f32 = embedding1
        .iter()
        .zip(embedding2.iter())
        .map(|(a, b)| a * b)
        .sum();

    let norm1: f32 = embedding1.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm2: f32 = embedding2.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm1 == 0.0 || norm2 == 0.0 {
        0.0
    } else {
        dot_product / (norm1 * norm2)
    }
}

use crate::embedding_service::EmbeddingService;
use crate::models::*;
use crate::ollama_service::OllamaService;
use crate::vector_store::VectorStore;
use anyhow::Result;
use std::sync::Arc;

pub struct QueryService {
    embedding_service: Arc<EmbeddingService>,
    ollama_service: Arc<OllamaService>,
    k: usize,
}

impl QueryService {
    pub fn new(
        embedding_service: Arc<EmbeddingService>,
        ollama_service: Arc<OllamaService>,
        k: usize,
    ) -> Self {
        Self {
            embedding_service,
            ollama_service,
            k,
        }
    }

    pub async fn query(&self, question: &str, vector_store: &VectorStore) -> Result<QueryResponse> {
        let start_time = std::time::Instant::now();

        let query_embedding = self.embedding_service.embed_query(question).await?;

        let relevant_chunks: Vec<DocumentChunk> = vector_store
            .similarity_search(&query_embedding, self.k)?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect();

        let answer = self
            .ollama_service
            .generate_response(question, &relevant_chunks)
            .await?;

        let sources = relevant_chunks.iter().map(DocumentChunk::metadata).collect();

        let processing_time = start_time.elapsed().as_millis();
        log::info!("Answered question in {} ms", processing_time);

        Ok(QueryResponse {
            status: "success".to_string(),
            answer,
            sources,
            processing_time_ms: processing_time,
        })
    }
}

use serde::{Deserialize, Serialize};

/// A loaded unit of text. PDFs yield one per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub page: Option<u32>,
    pub file_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub page: Option<u32>,
    pub file_id: Option<String>,
    pub content: String,
    pub start_index: usize,
    pub end_index: usize,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            source: self.source.clone(),
            page: self.page,
            file_id: self.file_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub answer: String,
    pub sources: Vec<SourceMetadata>,
    pub processing_time_ms: u128,
}

/// Result of `RagModel::get_answer`, mirrored by the `/ask` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub status: String,
    pub sources: Option<Vec<SourceMetadata>>,
    pub error: Option<String>,
}

impl Answer {
    pub fn success(answer: String, sources: Vec<SourceMetadata>) -> Self {
        Self {
            answer,
            status: "success".to_string(),
            sources: Some(sources),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            answer: "Sorry, I encountered an error processing your question.".to_string(),
            status: "error".to_string(),
            sources: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaEmbeddingRequest {
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaEmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: OllamaGenerateOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaGenerateOptions {
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaGenerateResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

use docqa_rag::StoredFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<StoredFile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub indexed_chunks: usize,
    pub ollama: bool,
}

use anyhow::{bail, Context, Result};
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Source {
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub status: String,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    documents: Vec<StoredFile>,
}

/// HTTP client for the question answering server.
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let response = self
            .client
            .post(format!("{}/ask", self.base_url))
            .json(&json!({ "text": question }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status, body);
        }
        Ok(response.json().await?)
    }

    pub async fn upload(&self, path: &Path) -> Result<UploadResponse> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Path has no file name")?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let part = multipart::Part::bytes(bytes).file_name(filename);
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status, body);
        }
        Ok(response.json().await?)
    }

    pub async fn documents(&self) -> Result<Vec<StoredFile>> {
        let response = self
            .client
            .get(format!("{}/documents", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let body: DocumentsResponse = response.json().await?;
        Ok(body.documents)
    }
}

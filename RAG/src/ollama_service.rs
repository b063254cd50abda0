use crate::config::Settings;
use crate::models::*;
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

const NO_ANSWER: &str = "No answer found.";

/// Text generation through Ollama's `/api/generate` endpoint.
pub struct OllamaService {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaService {
    pub fn new(settings: &Settings) -> Result<Self> {
        log::info!("Initializing LLM {}...", settings.llm_model);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.ollama_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.ollama_url.clone(),
            model: settings.llm_model.clone(),
            temperature: settings.llm_temperature,
            max_retries: settings.ollama_max_retries,
        })
    }

    pub async fn generate_response(
        &self,
        question: &str,
        relevant_chunks: &[DocumentChunk],
    ) -> Result<String> {
        let context = build_context(relevant_chunks);
        let prompt = build_prompt(question, &context);

        let answer = with_retries(self.max_retries, "Generate request", || {
            self.generate_once(&prompt)
        })
        .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            Ok(NO_ANSWER.to_string())
        } else {
            Ok(answer.to_string())
        }
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaGenerateOptions {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama generate error ({}): {}", status, error_text));
        }

        let body: OllamaGenerateResponse = response.json().await?;
        Ok(body.response)
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::warn!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

/// "Stuff" strategy: every retrieved chunk goes into the prompt verbatim.
pub fn build_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r#"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#
    )
}

/// Runs `operation` up to `max_retries + 1` times, sleeping `2^attempt` seconds between tries.
pub(crate) async fn with_retries<T, F, Fut>(
    max_retries: u32,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.saturating_pow(attempt));
                log::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

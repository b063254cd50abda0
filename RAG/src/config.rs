use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Backoff doubles per retry, so 10 retries already wait over 17 minutes in total.
pub const MAX_OLLAMA_RETRIES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    MongoDb,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Filesystem => "filesystem",
            StorageBackend::MongoDb => "mongodb",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "filesystem" | "fs" => Ok(StorageBackend::Filesystem),
            "mongodb" | "mongo" => Ok(StorageBackend::MongoDb),
            other => Err(anyhow!(
                "Unknown STORAGE_BACKEND '{}', expected 'filesystem' or 'mongodb'",
                other
            )),
        }
    }
}

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub storage_backend: StorageBackend,
    pub documents_dir: PathBuf,
    pub vector_store_path: PathBuf,
    pub mongodb_url: String,
    pub mongodb_database: String,
    pub ollama_url: String,
    pub embed_model: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub embed_concurrency: usize,
    pub ollama_max_retries: u32,
    pub ollama_timeout_secs: u64,
    pub bind_addr: String,
    pub max_upload_mb: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Filesystem,
            documents_dir: PathBuf::from("/app/documents"),
            vector_store_path: PathBuf::from("/app/vector_store"),
            mongodb_url: "mongodb://mongodb:27017".to_string(),
            mongodb_database: "company_docs".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            llm_model: "mistral".to_string(),
            llm_temperature: 0.1,
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_k: 3,
            embed_concurrency: 4,
            ollama_max_retries: 2,
            ollama_timeout_secs: 120,
            bind_addr: "0.0.0.0:8000".to_string(),
            max_upload_mb: 50,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(value) = lookup("STORAGE_BACKEND") {
            settings.storage_backend = value.parse()?;
        }
        if let Some(value) = lookup("DOCUMENTS_DIR") {
            settings.documents_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("VECTOR_STORE_PATH") {
            settings.vector_store_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("MONGODB_URL") {
            settings.mongodb_url = value;
        }
        if let Some(value) = lookup("MONGODB_DATABASE") {
            settings.mongodb_database = value;
        }
        if let Some(value) = lookup("OLLAMA_URL") {
            settings.ollama_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("EMBED_MODEL") {
            settings.embed_model = value;
        }
        if let Some(value) = lookup("LLM_MODEL") {
            settings.llm_model = value;
        }
        if let Some(value) = lookup("BIND_ADDR") {
            settings.bind_addr = value;
        }

        settings.llm_temperature = parse_or(&lookup, "LLM_TEMPERATURE", settings.llm_temperature)?;
        settings.chunk_size = parse_or(&lookup, "CHUNK_SIZE", settings.chunk_size)?;
        settings.chunk_overlap = parse_or(&lookup, "CHUNK_OVERLAP", settings.chunk_overlap)?;
        settings.retrieval_k = parse_or(&lookup, "RETRIEVAL_K", settings.retrieval_k)?;
        settings.embed_concurrency =
            parse_or(&lookup, "EMBED_CONCURRENCY", settings.embed_concurrency)?;
        settings.ollama_max_retries =
            parse_or(&lookup, "OLLAMA_MAX_RETRIES", settings.ollama_max_retries)?;
        settings.ollama_timeout_secs =
            parse_or(&lookup, "OLLAMA_TIMEOUT_SECS", settings.ollama_timeout_secs)?;
        settings.max_upload_mb = parse_or(&lookup, "MAX_UPLOAD_MB", settings.max_upload_mb)?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("CHUNK_SIZE must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            ));
        }
        if self.retrieval_k == 0 {
            return Err(anyhow!("RETRIEVAL_K must be greater than zero"));
        }
        if self.embed_concurrency == 0 {
            return Err(anyhow!("EMBED_CONCURRENCY must be greater than zero"));
        }
        if self.ollama_max_retries > MAX_OLLAMA_RETRIES {
            return Err(anyhow!(
                "OLLAMA_MAX_RETRIES ({}) must be at most {}",
                self.ollama_max_retries,
                MAX_OLLAMA_RETRIES
            ));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.storage_backend, StorageBackend::Filesystem);
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.retrieval_k, 3);
        assert_eq!(settings.embed_model, "nomic-embed-text");
        assert_eq!(settings.llm_model, "mistral");
        assert_eq!(settings.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn reads_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "Mongo"),
            ("OLLAMA_URL", "http://ollama:11434/"),
            ("CHUNK_SIZE", "400"),
            ("CHUNK_OVERLAP", "40"),
            ("LLM_TEMPERATURE", "0.5"),
        ]))
        .unwrap();

        assert_eq!(settings.storage_backend, StorageBackend::MongoDb);
        assert_eq!(settings.ollama_url, "http://ollama:11434");
        assert_eq!(settings.chunk_size, 400);
        assert_eq!(settings.chunk_overlap, 40);
        assert!((settings.llm_temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Settings::from_lookup(lookup_from(&[("RETRIEVAL_K", "three")])).unwrap_err();
        assert!(err.to_string().contains("RETRIEVAL_K"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let result = Settings::from_lookup(lookup_from(&[
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn caps_ollama_retries() {
        let settings =
            Settings::from_lookup(lookup_from(&[("OLLAMA_MAX_RETRIES", "10")])).unwrap();
        assert_eq!(settings.ollama_max_retries, MAX_OLLAMA_RETRIES);

        let err = Settings::from_lookup(lookup_from(&[("OLLAMA_MAX_RETRIES", "64")])).unwrap_err();
        assert!(err.to_string().contains("OLLAMA_MAX_RETRIES"));
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!("sqlite".parse::<StorageBackend>().is_err());
        assert_eq!("FS".parse::<StorageBackend>().unwrap(), StorageBackend::Filesystem);
    }
}

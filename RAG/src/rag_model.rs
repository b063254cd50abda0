use crate::config::{Settings, StorageBackend};
use crate::document_processor::{DocumentKind, DocumentProcessor};
use crate::document_store::{DocumentStore, FsDocumentStore, MongoDocumentStore};
use crate::embedding_service::EmbeddingService;
use crate::models::*;
use crate::ollama_service::OllamaService;
use crate::query_service::QueryService;
use crate::text_splitter::RecursiveCharacterTextSplitter;
use crate::vector_store::VectorStore;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub backend: String,
    pub indexed_chunks: usize,
    pub ollama: bool,
}

/// Ties storage, ingestion and question answering together.
///
/// Readers clone the current index handle and release the lock before talking to
/// Ollama. Ingestion is serialised by `ingest_lock` and swaps in a new index when done.
pub struct RagModel {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    splitter: RecursiveCharacterTextSplitter,
    embedding_service: Arc<EmbeddingService>,
    ollama_service: Arc<OllamaService>,
    query_service: QueryService,
    vector_store: RwLock<Option<Arc<VectorStore>>>,
    ingest_lock: Mutex<()>,
}

impl RagModel {
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match settings.storage_backend {
            StorageBackend::Filesystem => {
                tokio::fs::create_dir_all(&settings.documents_dir).await?;
                tokio::fs::create_dir_all(&settings.vector_store_path).await?;
                log::info!("Using DOCUMENTS_DIR: {}", settings.documents_dir.display());
                log::info!("Using VECTOR_STORE_PATH: {}", settings.vector_store_path.display());
                Arc::new(FsDocumentStore::new(settings.documents_dir.clone()))
            }
            StorageBackend::MongoDb => Arc::new(
                MongoDocumentStore::connect(&settings.mongodb_url, &settings.mongodb_database)
                    .await?,
            ),
        };
        log::info!("Using OLLAMA_URL: {}", settings.ollama_url);

        Self::with_store(settings, store)
    }

    pub fn with_store(settings: Settings, store: Arc<dyn DocumentStore>) -> Result<Self> {
        settings.validate()?;

        let splitter =
            RecursiveCharacterTextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
        let embedding_service = Arc::new(EmbeddingService::new(&settings)?);
        let ollama_service = Arc::new(OllamaService::new(&settings)?);
        let query_service = QueryService::new(
            embedding_service.clone(),
            ollama_service.clone(),
            settings.retrieval_k,
        );

        Ok(Self {
            settings,
            store,
            splitter,
            embedding_service,
            ollama_service,
            query_service,
            vector_store: RwLock::new(None),
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Startup ingestion. An empty corpus is not an error; questions will report it.
    pub async fn initialize(&self) -> Result<()> {
        match self.settings.storage_backend {
            StorageBackend::Filesystem => {
                self.load_and_process_documents().await?;
                self.initialize_qa_chain().await?;
            }
            StorageBackend::MongoDb => {
                let _guard = self.ingest_lock.lock().await;
                let files = self.store.list().await?;
                log::info!("Found {} stored file(s) in {}", files.len(), self.store.describe());
                for file in files {
                    if let Err(e) = self.process_stored_file(&file).await {
                        log::error!("Error processing {} ({}): {:#}", file.filename, file.id, e);
                    }
                }
            }
        }

        log::info!("Model initialization completed");
        Ok(())
    }

    /// Rebuilds the index from the documents directory and persists it.
    /// Returns the number of indexed chunks, or 0 when no documents were found.
    pub async fn load_and_process_documents(&self) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;
        self.rebuild_from_directory().await
    }

    /// Loads the persisted index, if there is one.
    pub async fn initialize_qa_chain(&self) -> Result<bool> {
        let path = self.settings.vector_store_path.clone();
        let loaded = tokio::task::spawn_blocking(move || VectorStore::load(&path)).await??;

        let mut current = self.vector_store.write().await;
        match loaded {
            Some(store) => {
                *current = Some(Arc::new(store));
                log::info!("QA chain initialized successfully.");
                Ok(true)
            }
            None if current.is_some() => Ok(true),
            None => {
                log::warn!("Vector store not initialized. Please load documents first.");
                Ok(false)
            }
        }
    }

    /// Stores an uploaded file and brings the index up to date with it.
    ///
    /// The filesystem variant only indexes files by extension, so names without a
    /// supported one are rejected there.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<StoredFile> {
        if self.settings.storage_backend == StorageBackend::Filesystem
            && DocumentKind::from_filename(filename).is_none()
        {
            return Err(anyhow!(
                "Unsupported file type '{}': expected .pdf, .txt or .md",
                filename
            ));
        }

        let _guard = self.ingest_lock.lock().await;

        let source = filename.to_string();
        let (documents, bytes) = tokio::task::spawn_blocking(move || {
            DocumentProcessor::new()
                .load_bytes(&source, &bytes, None)
                .map(|documents| (documents, bytes))
        })
        .await??;

        let file = self.store.save(filename, &bytes).await?;

        match self.settings.storage_backend {
            StorageBackend::Filesystem => {
                self.rebuild_from_directory().await?;
            }
            StorageBackend::MongoDb => {
                let documents = documents
                    .into_iter()
                    .map(|mut document| {
                        document.source = file.filename.clone();
                        document.file_id = Some(file.id.clone());
                        document
                    })
                    .collect::<Vec<_>>();
                self.index_documents(documents).await?;
            }
        }

        Ok(file)
    }

    pub async fn get_answer(&self, question: &str) -> Answer {
        match self.try_answer(question).await {
            Ok(response) => Answer::success(response.answer, response.sources),
            Err(e) => {
                log::error!("Error getting answer: {:#}", e);
                Answer::error(format!("{:#}", e))
            }
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<StoredFile>> {
        self.store.list().await
    }

    pub fn location(&self, file: &StoredFile) -> Option<String> {
        self.store.location(file)
    }

    pub async fn indexed_chunks(&self) -> usize {
        self.vector_store
            .read()
            .await
            .as_ref()
            .map(|store| store.len())
            .unwrap_or(0)
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            backend: self.settings.storage_backend.as_str().to_string(),
            indexed_chunks: self.indexed_chunks().await,
            ollama: self.ollama_service.health_check().await,
        }
    }

    async fn try_answer(&self, question: &str) -> Result<QueryResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(anyhow!("Question text must not be empty"));
        }

        let store = self
            .vector_store
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("QA chain not initialized."))?;

        self.query_service.query(question, &store).await
    }

    async fn rebuild_from_directory(&self) -> Result<usize> {
        let dir = self.settings.documents_dir.clone();
        let documents =
            tokio::task::spawn_blocking(move || DocumentProcessor::new().process_documents(&dir))
                .await??;

        if documents.is_empty() {
            log::warn!("No documents found in the directory. Skipping vector store creation.");
            return Ok(0);
        }

        let mut chunks = self.split(documents).await?;
        if chunks.is_empty() {
            log::warn!("Documents produced no text chunks. Skipping vector store creation.");
            return Ok(0);
        }
        self.embedding_service.embed_documents(&mut chunks).await?;

        log::info!("Creating vector store...");
        let store = VectorStore::from_chunks(chunks)?;
        let count = store.len();

        let path = self.settings.vector_store_path.clone();
        let store = tokio::task::spawn_blocking(move || store.save(&path).map(|_| store)).await??;

        *self.vector_store.write().await = Some(Arc::new(store));
        Ok(count)
    }

    async fn process_stored_file(&self, file: &StoredFile) -> Result<usize> {
        let bytes = self.store.read(&file.id).await?;
        let source = file.filename.clone();
        let file_id = file.id.clone();
        let documents = tokio::task::spawn_blocking(move || {
            DocumentProcessor::new().load_bytes(&source, &bytes, Some(file_id))
        })
        .await??;

        self.index_documents(documents).await
    }

    /// Splits, embeds and appends documents to the current index.
    async fn index_documents(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            log::warn!("No text extracted; nothing to index.");
            return Ok(0);
        }

        let mut chunks = self.split(documents).await?;
        if chunks.is_empty() {
            return Ok(0);
        }
        self.embedding_service.embed_documents(&mut chunks).await?;
        let count = chunks.len();

        let mut current = self.vector_store.write().await;
        let next = match current.as_ref() {
            Some(existing) => {
                let mut next = VectorStore::clone(existing);
                next.add_chunks(chunks)?;
                next
            }
            None => VectorStore::from_chunks(chunks)?,
        };
        log::info!("Vector store now holds {} chunks", next.len());
        *current = Some(Arc::new(next));

        Ok(count)
    }

    async fn split(&self, documents: Vec<Document>) -> Result<Vec<DocumentChunk>> {
        let splitter = self.splitter.clone();
        let chunks =
            tokio::task::spawn_blocking(move || splitter.split_documents(&documents)).await?;
        Ok(chunks)
    }
}

pub mod config;
pub mod document_processor;
pub mod document_store;
pub mod embedding_service;
pub mod models;
pub mod ollama_service;
pub mod query_service;
pub mod rag_model;
pub mod text_splitter;
pub mod vector_store;

pub use config::{Settings, StorageBackend};
pub use document_processor::DocumentProcessor;
pub use document_store::{DocumentStore, FsDocumentStore, MongoDocumentStore};
pub use embedding_service::EmbeddingService;
pub use models::*;
pub use ollama_service::OllamaService;
pub use query_service::QueryService;
pub use rag_model::{ModelStatus, RagModel};
pub use text_splitter::RecursiveCharacterTextSplitter;
pub use vector_store::VectorStore;

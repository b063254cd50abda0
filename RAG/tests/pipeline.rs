use axum::routing::{get, post};
use axum::{Json, Router};
use docqa_rag::{FsDocumentStore, RagModel, Settings, StorageBackend};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSIONS: usize = 256;

/// Bag-of-words hashing embedding, enough to make retrieval deterministic.
fn embed(text: &str) -> Vec<f32> {
    let text = text
        .trim_start_matches("passage: ")
        .trim_start_matches("query: ");

    let mut vector = vec![0.0; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let word = word.to_lowercase();
        let hash = word
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        vector[hash as usize % DIMENSIONS] += 1.0;
    }
    vector
}

async fn spawn_mock_ollama() -> String {
    async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["prompt"].as_str().unwrap_or_default();
        Json(json!({ "embedding": embed(prompt) }))
    }

    async fn generate(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({ "response": body["prompt"], "done": true }))
    }

    async fn tags() -> Json<Value> {
        Json(json!({ "models": [] }))
    }

    let app = Router::new()
        .route("/api/embeddings", post(embeddings))
        .route("/api/generate", post(generate))
        .route("/api/tags", get(tags));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn settings(root: &Path, ollama_url: String) -> Settings {
    Settings {
        storage_backend: StorageBackend::Filesystem,
        documents_dir: root.join("documents"),
        vector_store_path: root.join("vector_store"),
        ollama_url,
        retrieval_k: 1,
        ollama_max_retries: 0,
        ollama_timeout_secs: 10,
        ..Settings::default()
    }
}

/// GridFS variant wired to a directory-backed store: same code path, no MongoDB needed.
fn document_db_model(root: &Path, ollama_url: String) -> RagModel {
    let settings = Settings {
        storage_backend: StorageBackend::MongoDb,
        ..settings(root, ollama_url)
    };
    let store = Arc::new(FsDocumentStore::new(root.join("documents")));
    RagModel::with_store(settings, store).unwrap()
}

async fn upload_corpus(model: &RagModel) {
    model
        .upload(
            "vacation.txt",
            b"Employees receive 25 vacation days per year.".to_vec(),
        )
        .await
        .unwrap();
    model
        .upload(
            "security.md",
            b"# Security\n\nBadges must be worn at all times inside the office.".to_vec(),
        )
        .await
        .unwrap();
    model
        .upload(
            "expenses.txt",
            b"Expense reports are due within thirty days of purchase.".to_vec(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn answers_from_uploaded_documents() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();

    model.initialize().await.unwrap();
    let before = model.get_answer("Anything?").await;
    assert_eq!(before.status, "error");
    assert_eq!(before.error.as_deref(), Some("QA chain not initialized."));

    upload_corpus(&model).await;
    assert_eq!(model.indexed_chunks().await, 3);
    assert!(root.path().join("vector_store/index.json").exists());
    assert_eq!(model.list_documents().await.unwrap().len(), 3);

    let answer = model
        .get_answer("How many vacation days do employees receive?")
        .await;
    assert_eq!(answer.status, "success");
    assert!(answer.error.is_none());
    assert!(answer.answer.contains("Employees receive 25 vacation days per year."));
    assert!(answer
        .answer
        .ends_with("Question: How many vacation days do employees receive?\nHelpful Answer:"));

    let sources = answer.sources.unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].source.ends_with("vacation.txt"));
}

#[tokio::test]
async fn restart_loads_persisted_index() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;

    let first = RagModel::from_settings(settings(root.path(), ollama_url.clone()))
        .await
        .unwrap();
    upload_corpus(&first).await;
    drop(first);

    let second = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();
    assert_eq!(second.indexed_chunks().await, 0);
    assert!(second.initialize_qa_chain().await.unwrap());
    assert_eq!(second.indexed_chunks().await, 3);

    let answer = second.get_answer("When are expense reports due?").await;
    assert_eq!(answer.status, "success");
    assert!(answer.sources.unwrap()[0].source.ends_with("expenses.txt"));
}

#[tokio::test]
async fn startup_indexes_existing_directory() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let documents = root.path().join("documents");
    std::fs::create_dir_all(&documents).unwrap();
    std::fs::write(documents.join("faq.txt"), "The cafeteria opens at eight.").unwrap();

    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();
    model.initialize().await.unwrap();

    assert_eq!(model.indexed_chunks().await, 1);
    let answer = model.get_answer("When does the cafeteria open?").await;
    assert_eq!(answer.status, "success");
}

#[tokio::test]
async fn unparseable_upload_is_rejected_and_not_stored() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();

    assert!(model
        .upload("broken.pdf", b"definitely not a pdf".to_vec())
        .await
        .is_err());
    assert!(model.list_documents().await.unwrap().is_empty());
    assert_eq!(model.indexed_chunks().await, 0);
}

#[tokio::test]
async fn blank_question_is_an_error() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();
    upload_corpus(&model).await;

    let answer = model.get_answer("   ").await;
    assert_eq!(answer.status, "error");
    assert_eq!(
        answer.answer,
        "Sorry, I encountered an error processing your question."
    );
    assert!(answer.sources.is_none());
}

#[tokio::test]
async fn status_reports_backend_and_ollama() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();

    let status = model.status().await;
    assert_eq!(status.backend, "filesystem");
    assert_eq!(status.indexed_chunks, 0);
    assert!(status.ollama);
}

#[tokio::test]
async fn unreachable_ollama_fails_ingestion() {
    let root = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let model = RagModel::from_settings(settings(root.path(), dead_url))
        .await
        .unwrap();

    assert!(model
        .upload("notes.txt", b"Some notes.".to_vec())
        .await
        .is_err());
    assert_eq!(model.indexed_chunks().await, 0);
    assert!(!model.status().await.ollama);
}

#[tokio::test]
async fn document_db_uploads_append_to_the_index() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = document_db_model(root.path(), ollama_url);
    model.initialize().await.unwrap();

    model
        .upload(
            "vacation.txt",
            b"Employees receive 25 vacation days per year.".to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(model.indexed_chunks().await, 1);

    model
        .upload(
            "expenses.txt",
            b"Expense reports are due within thirty days of purchase.".to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(model.indexed_chunks().await, 2);
    assert!(!root.path().join("vector_store/index.json").exists());

    let answer = model
        .get_answer("How many vacation days do employees receive?")
        .await;
    assert_eq!(answer.status, "success");
    let sources = answer.sources.unwrap();
    assert_eq!(sources[0].source, "vacation.txt");
    assert_eq!(sources[0].file_id.as_deref(), Some("vacation.txt"));

    let answer = model.get_answer("When are expense reports due?").await;
    let sources = answer.sources.unwrap();
    assert_eq!(sources[0].source, "expenses.txt");
    assert_eq!(sources[0].file_id.as_deref(), Some("expenses.txt"));
}

#[tokio::test]
async fn document_db_startup_skips_files_that_fail_to_load() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let documents = root.path().join("documents");
    std::fs::create_dir_all(&documents).unwrap();
    std::fs::write(documents.join("broken.pdf"), b"definitely not a pdf").unwrap();
    std::fs::write(documents.join("faq.txt"), "The cafeteria opens at eight.").unwrap();
    std::fs::write(
        documents.join("security.md"),
        "# Security\n\nBadges must be worn at all times inside the office.",
    )
    .unwrap();

    let model = document_db_model(root.path(), ollama_url);
    model.initialize().await.unwrap();
    assert_eq!(model.indexed_chunks().await, 2);

    let answer = model.get_answer("When does the cafeteria open?").await;
    assert_eq!(answer.status, "success");
    let sources = answer.sources.unwrap();
    assert_eq!(sources[0].file_id.as_deref(), Some("faq.txt"));
}

#[tokio::test]
async fn extensionless_upload_is_rejected_on_the_filesystem() {
    let root = TempDir::new().unwrap();
    let ollama_url = spawn_mock_ollama().await;
    let model = RagModel::from_settings(settings(root.path(), ollama_url))
        .await
        .unwrap();

    let err = model
        .upload("report", b"Quarterly numbers.".to_vec())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unsupported file type"));
    assert!(model.list_documents().await.unwrap().is_empty());
    assert!(!root.path().join("documents/report").exists());
}

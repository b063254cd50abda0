mod question_payload;
mod rag_response;
mod routes;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use docqa_rag::{RagModel, Settings};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

fn app(model: Arc<RagModel>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(routes::upload_file))
        .route("/ask", post(routes::ask_question))
        .route("/documents", get(routes::list_documents))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(model)
}

async fn run() -> Result<()> {
    let settings = Settings::from_env().context("Invalid configuration")?;

    let model = RagModel::from_settings(settings.clone()).await?;
    model
        .initialize()
        .await
        .context("Error during startup")?;
    let model = Arc::new(model);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app(model, settings.max_upload_bytes())).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Json;
    use docqa_rag::StorageBackend;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docqa-test-boundary";

    async fn spawn_mock_ollama() -> String {
        async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
            let prompt = body["prompt"].as_str().unwrap_or_default();
            let mut vector = vec![0.0f32; 64];
            for word in prompt.split_whitespace() {
                let slot = word.bytes().map(|b| b as usize).sum::<usize>() % 64;
                vector[slot] += 1.0;
            }
            Json(json!({ "embedding": vector }))
        }

        async fn generate(Json(_body): Json<Value>) -> Json<Value> {
            Json(json!({ "response": "  The office opens at nine.  " }))
        }

        async fn tags() -> Json<Value> {
            Json(json!({ "models": [] }))
        }

        let mock = Router::new()
            .route("/api/embeddings", post(embeddings))
            .route("/api/generate", post(generate))
            .route("/api/tags", get(tags));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, mock).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn test_app(root: &TempDir) -> Router {
        let settings = Settings {
            storage_backend: StorageBackend::Filesystem,
            documents_dir: root.path().join("documents"),
            vector_store_path: root.path().join("vector_store"),
            ollama_url: spawn_mock_ollama().await,
            ollama_max_retries: 0,
            ..Settings::default()
        };
        let model = RagModel::from_settings(settings).await.unwrap();
        model.initialize().await.unwrap();
        app(Arc::new(model), 1024 * 1024)
    }

    fn multipart_request(field: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn ask_request(text: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "text": text }).to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ask_before_any_upload_reports_error_status() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app.oneshot(ask_request("Where is the office?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "QA chain not initialized.");
        assert_eq!(
            body["answer"],
            "Sorry, I encountered an error processing your question."
        );
    }

    #[tokio::test]
    async fn upload_then_ask() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app
            .clone()
            .oneshot(multipart_request("file", "hours.txt", "The office opens at nine."))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "File uploaded successfully");
        assert_eq!(body["file_id"], "hours.txt");
        assert!(body["file_path"].as_str().unwrap().ends_with("hours.txt"));
        assert!(root.path().join("documents/hours.txt").exists());

        let response = app
            .clone()
            .oneshot(ask_request("When does the office open?"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["answer"], "The office opens at nine.");
        assert!(body["error"].is_null());
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0]["source"].as_str().unwrap().ends_with("hours.txt"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["documents"][0]["filename"], "hours.txt");
    }

    #[tokio::test]
    async fn upload_without_file_field_is_bad_request() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app
            .oneshot(multipart_request("attachment", "hours.txt", "text"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Missing multipart field 'file'");
    }

    #[tokio::test]
    async fn upload_with_blank_file_name_is_bad_request() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        for filename in ["", "..", "docs/"] {
            let response = app
                .clone()
                .oneshot(multipart_request("file", filename, "text"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "filename {:?}", filename);
        }
        assert!(!root.path().join("documents").read_dir().unwrap().any(|_| true));
    }

    #[tokio::test]
    async fn upload_without_supported_extension_is_rejected() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app
            .oneshot(multipart_request("file", "report", "The office opens at nine."))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));
        assert!(!root.path().join("documents/report").exists());
    }

    #[tokio::test]
    async fn unparseable_upload_is_server_error() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app
            .oneshot(multipart_request("file", "broken.pdf", "not a pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().len() > 0);
        assert!(!root.path().join("documents/broken.pdf").exists());
    }

    #[tokio::test]
    async fn health_reports_index_and_ollama() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "filesystem");
        assert_eq!(body["indexed_chunks"], 0);
        assert_eq!(body["ollama"], true);
    }
}

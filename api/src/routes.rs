use crate::question_payload::QuestionPayload;
use crate::rag_response::{DocumentsResponse, HealthResponse, UploadResponse};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use docqa_rag::document_store::sanitize_filename;
use docqa_rag::{Answer, ErrorResponse, RagModel};
use std::sync::Arc;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Stores the multipart field `file` and indexes it.
pub async fn upload_file(
    State(model): State<Arc<RagModel>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Uploaded file has no file name"))
            .and_then(|name| {
                sanitize_filename(name)
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
            })?;
        let data = field
            .bytes()
            .await
            .map_err(|e| api_error(e.status(), e.body_text()))?;

        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing multipart field 'file'"))?;
    log::info!("Received upload {} ({} bytes)", filename, data.len());

    match model.upload(&filename, data).await {
        Ok(file) => Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file_path: model.location(&file),
            file_id: file.id,
        })),
        Err(e) => {
            log::error!("Error uploading file: {:#}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))
        }
    }
}

/// Always 200; failures are reported inside the `Answer`.
pub async fn ask_question(
    State(model): State<Arc<RagModel>>,
    Json(question): Json<QuestionPayload>,
) -> Json<Answer> {
    Json(model.get_answer(&question.text).await)
}

pub async fn list_documents(
    State(model): State<Arc<RagModel>>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    match model.list_documents().await {
        Ok(documents) => Ok(Json(DocumentsResponse { documents })),
        Err(e) => {
            log::error!("Error listing documents: {:#}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))
        }
    }
}

pub async fn health(State(model): State<Arc<RagModel>>) -> Json<HealthResponse> {
    let status = model.status().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: status.backend,
        indexed_chunks: status.indexed_chunks,
        ollama: status.ollama,
    })
}

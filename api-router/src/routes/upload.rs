use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::error::AppError;
use ingestion_pipeline::publisher;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Extension check on the client-supplied filename, case-insensitive.
fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
}

/// Accept a spreadsheet upload, ingest it and publish the documents.
pub async fn upload(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::ValidationError("No selected file".to_string()))?;

    if !allowed_file(&file_name) {
        return Err(ApiError::ValidationError(
            "Invalid file type. Only .xlsx and .xls allowed.".to_string(),
        ));
    }

    info!(file_name, "received spreadsheet upload");

    // The multipart temp file has no extension, but the workbook reader
    // picks its parser from one. Copy to a suffixed temp path first.
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let workbook_file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .map_err(AppError::Io)?;
    tokio::fs::copy(input.file.contents.path(), workbook_file.path())
        .await
        .map_err(AppError::Io)?;

    let documents = state.ingestor.ingest(workbook_file.path()).await?;
    publisher::publish(&state.db, &documents).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "File uploaded and indexed successfully." })),
    ))
}

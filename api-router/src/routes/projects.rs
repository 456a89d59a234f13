use axum::{extract::State, response::IntoResponse, Json};
use common::{error::AppError, storage::types::index_document::IndexDocument};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

/// List the distinct project names present in the index, sorted.
pub async fn get_projects(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let projects = IndexDocument::list_project_names(&state.db)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(json!({ "projects": projects })))
}

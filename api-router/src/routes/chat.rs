use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: Option<String>,
}

/// Answer a question using context retrieved from the index.
pub async fn chat(
    State(state): State<ApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload
        .question
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::ValidationError("Missing 'question' field".to_string()))?;

    info!(question_len = question.len(), "received chat request");

    let context = retrieval_pipeline::retrieve(
        &state.db,
        &state.embedding_provider,
        &question,
        state.config.retrieval_top_k,
    )
    .await?;

    let answer = retrieval_pipeline::answer::generate_answer(
        &state.openai_client,
        &state.config.chat_model,
        &context,
        &question,
    )
    .await?;

    Ok(Json(json!({ "answer": answer })))
}

use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    chat::dto::{AnswerResponse, Question},
    error::ApiError,
    state::AppState,
};

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[instrument(skip(state, question), fields(history = question.history.len()))]
pub async fn chat(
    State(state): State<AppState>,
    Json(question): Json<Question>,
) -> Result<Json<AnswerResponse>, ApiError> {
    if question.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".into()));
    }

    let answer = state.llm.execute(&question).await?;
    info!(used_tokens = ?answer.used_tokens, "chat answered");
    Ok(Json(answer.into()))
}

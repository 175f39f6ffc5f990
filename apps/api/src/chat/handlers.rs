//! Axum route handlers for the interview chat.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::chat::interviewer::send_message;
use crate::errors::AppError;
use crate::models::chat::ChatMessageRow;
use crate::state::AppState;
use crate::workflow::session::load_session;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "he".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<ChatMessageRow>,
}

/// POST /api/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let reply = send_message(
        state.store.as_ref(),
        state.llm.as_ref(),
        &request.session_id,
        &request.message,
        &request.language,
    )
    .await?;
    Ok(Json(ChatResponse {
        reply: reply.content,
    }))
}

/// GET /api/sessions/:id/messages
pub async fn handle_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let session = load_session(state.store.as_ref(), &session_id).await?;
    let messages = state.store.list_chat(&session.id).await?;
    Ok(Json(TranscriptResponse { messages }))
}

//! Axum route handlers for the Generation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::generation::generator::GenerationOutcome;
use crate::generation::translate::translate_text;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCvRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateCvResponse {
    pub success: bool,
    pub data: GenerationOutcome,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub target_lang: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translated: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate-cv
///
/// Runs generation inline for a paid session. A completed session returns
/// its stored CV without a model call.
pub async fn handle_generate_cv(
    State(state): State<AppState>,
    Json(request): Json<GenerateCvRequest>,
) -> Result<Json<GenerateCvResponse>, AppError> {
    let data = state
        .generator
        .run(&request.session_id, request.lang.as_deref())
        .await?;

    Ok(Json(GenerateCvResponse {
        success: true,
        data,
    }))
}

/// POST /api/translate
pub async fn handle_translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    if request.target_lang.trim().is_empty() {
        return Err(AppError::Validation("targetLang is required".to_string()));
    }

    let translated = translate_text(state.llm.as_ref(), &request.text, &request.target_lang)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(TranslateResponse { translated }))
}

//! Axum route handlers for content validation.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::validation::advisor::{review_content, ContentField, ContentIssue};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateContentRequest {
    pub content: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub field: ContentField,
}

fn default_lang() -> String {
    "he".to_string()
}

#[derive(Debug, Serialize)]
pub struct ValidateContentResponse {
    pub issues: Vec<ContentIssue>,
}

/// POST /api/validate-content
///
/// Advisory only: heuristics always run, the model pass fails open.
pub async fn handle_validate_content(
    State(state): State<AppState>,
    Json(request): Json<ValidateContentRequest>,
) -> Result<Json<ValidateContentResponse>, AppError> {
    if request.content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }

    let issues = review_content(
        state.llm.as_ref(),
        &request.content,
        request.field,
        &request.lang,
    )
    .await;

    Ok(Json(ValidateContentResponse { issues }))
}

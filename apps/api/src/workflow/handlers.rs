//! Axum route handlers for sessions and answer collection.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::content::CvContentRow;
use crate::models::session::{SessionRow, SessionStatus};
use crate::state::AppState;
use crate::validation::heuristics::{scan, HeuristicScan};
use crate::workflow::analysis::{analyze_answers, CvAnalysis};
use crate::workflow::answers::{answers_text, record_answers};
use crate::workflow::session::{create_session, load_session, next_step_url, validate_session_id};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub template_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_language() -> String {
    "he".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub template_id: String,
    pub language: String,
    pub package: Option<String>,
    pub metadata: Value,
    pub expires_at: DateTime<Utc>,
}

impl SessionView {
    fn from_row(row: SessionRow, now: DateTime<Utc>) -> Self {
        Self {
            status: row.effective_status(now),
            session_id: row.id,
            template_id: row.template_id,
            language: row.language,
            package: row.package,
            metadata: row.metadata,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCvRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub answers: Value,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub should_analyze: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCvResponse {
    pub success: bool,
    pub data: CvContentRow,
    pub analysis: Option<CvAnalysis>,
    pub checks: HeuristicScan,
    pub redirect_url: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    if request.template_id.trim().is_empty() {
        return Err(AppError::Validation("templateId is required".to_string()));
    }

    let session = create_session(
        state.store.as_ref(),
        state.config.session_ttl,
        &request.template_id,
        &request.language,
        request.metadata.unwrap_or_else(|| Value::Object(Default::default())),
    )
    .await?;

    Ok(Json(SessionView::from_row(session, Utc::now())))
}

/// GET /api/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = load_session(state.store.as_ref(), &session_id).await?;
    Ok(Json(SessionView::from_row(session, Utc::now())))
}

/// POST /api/save-cv
///
/// Upserts the collected answers, optionally runs the advisory analysis, and
/// tells the front end where to go next (payment, or generation if paid).
pub async fn handle_save_cv(
    State(state): State<AppState>,
    Json(request): Json<SaveCvRequest>,
) -> Result<Json<SaveCvResponse>, AppError> {
    let session = load_session(state.store.as_ref(), &request.session_id).await?;

    let data = record_answers(
        state.store.as_ref(),
        &session,
        &request.answers,
        &request.language,
    )
    .await?;

    let checks = scan(&answers_text(&request.answers));

    let analysis = if request.should_analyze {
        analyze_answers(state.llm.as_ref(), &request.answers, &request.language).await
    } else {
        None
    };

    let redirect_url = next_step_url(&session.id, session.effective_status(Utc::now()));

    Ok(Json(SaveCvResponse {
        success: true,
        data,
        analysis,
        checks,
        redirect_url,
    }))
}

/// GET /api/cv/:session_id
///
/// Polled by the progress page; returns the content record as stored.
pub async fn handle_get_cv(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CvContentRow>, AppError> {
    validate_session_id(&session_id)?;
    let content = state
        .store
        .get_content(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No CV content for session {session_id}")))?;
    Ok(Json(content))
}

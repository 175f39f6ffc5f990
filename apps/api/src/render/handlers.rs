//! Axum route handlers for PDF rendering.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::render::pipeline::PdfPipeline;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub session_id: String,
}

/// POST /api/generate-pdf
///
/// Renders the submitted HTML, stores it as the session's single PDF and
/// streams the bytes back as a download.
pub async fn handle_generate_pdf(
    State(state): State<AppState>,
    Json(request): Json<GeneratePdfRequest>,
) -> Result<Response, AppError> {
    if request.session_id.trim().is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }

    let pipeline = PdfPipeline {
        renderer: &state.renderer,
        objects: state.objects.as_ref(),
        store: state.store.as_ref(),
        reporter: &state.reporter,
        signed_url_ttl: state.config.signed_url_ttl,
    };
    let pdf = pipeline
        .run(&request.session_id, &request.html, &request.file_name)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf.record.filename),
            ),
        ],
        pdf.bytes,
    )
        .into_response())
}

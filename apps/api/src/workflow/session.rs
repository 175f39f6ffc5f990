use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{NewSession, SessionRow, SessionStatus};
use crate::store::CvStore;

lazy_static! {
    static ref SESSION_ID_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid session id regex");
}

/// Session ids are opaque, but they end up in object keys and redirect URLs,
/// so only a URL- and key-safe alphabet is accepted.
pub fn validate_session_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }
    if !SESSION_ID_RE.is_match(id) {
        return Err(AppError::Validation(format!("invalid sessionId '{id}'")));
    }
    Ok(())
}

pub async fn create_session(
    store: &dyn CvStore,
    ttl: Duration,
    template_id: &str,
    language: &str,
    metadata: Value,
) -> Result<SessionRow, AppError> {
    let session = store
        .insert_session(NewSession {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            language: language.to_string(),
            metadata,
            expires_at: Utc::now() + ttl,
        })
        .await?;
    info!(
        "Created session {} (template={}, language={})",
        session.id, session.template_id, session.language
    );
    Ok(session)
}

pub async fn load_session(store: &dyn CvStore, id: &str) -> Result<SessionRow, AppError> {
    validate_session_id(id)?;
    store
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// Rejects sessions whose effective status is `expired`.
pub fn ensure_live(session: &SessionRow, now: DateTime<Utc>) -> Result<SessionStatus, AppError> {
    match session.effective_status(now) {
        SessionStatus::Expired => Err(AppError::Gone(format!(
            "Session {} expired at {}",
            session.id, session.expires_at
        ))),
        status => Ok(status),
    }
}

/// Front-end path the user should continue to after saving answers.
pub fn next_step_url(session_id: &str, status: SessionStatus) -> String {
    match status {
        SessionStatus::Paid => format!("/generating?sessionId={session_id}"),
        _ => format!("/payment?sessionId={session_id}"),
    }
}

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::models::content::CvContentRow;
use crate::models::session::SessionRow;
use crate::store::CvStore;
use crate::workflow::session::ensure_live;

/// Concatenates every string and number leaf of the answers so text
/// heuristics can run over free-form answer JSON.
pub fn answers_text(answers: &Value) -> String {
    let mut parts = Vec::new();
    collect_text(answers, &mut parts);
    parts.join("\n")
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

/// Upserts the session's collected answers. Allowed while the content record
/// is absent, `draft` or `error`; a running or finished generation is a 409.
pub async fn record_answers(
    store: &dyn CvStore,
    session: &SessionRow,
    answers: &Value,
    language: &str,
) -> Result<CvContentRow, AppError> {
    ensure_live(session, Utc::now())?;

    if !answers.is_object() {
        return Err(AppError::Validation(
            "answers must be a JSON object".to_string(),
        ));
    }

    let row = store
        .upsert_answers(&session.id, answers, language)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "CV for session {} is already being generated or is complete",
                session.id
            ))
        })?;

    info!("Recorded answers for session {}", session.id);
    Ok(row)
}

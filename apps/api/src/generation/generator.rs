//! CV generation: the one pipeline behind both `POST /api/generate-cv` and
//! the background generation queue.
//!
//! Flow: load paid session → load answers → CAS `draft|error -> processing` →
//! LLM format (+ English variant for Pro, concurrently) → strip empty values →
//! CAS `processing -> completed`. Attempts run under a `RetryPolicy`; when the
//! budget is spent the record moves to `error` and the failure is reported.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::prompts::{CV_FORMAT_PROMPT_TEMPLATE, CV_FORMAT_SYSTEM};
use crate::generation::retry::RetryPolicy;
use crate::llm_client::prompts::{language_instruction, JSON_ONLY_RULES};
use crate::llm_client::{LlmBackend, LlmError};
use crate::models::content::ContentStatus;
use crate::models::session::{PackageTier, SessionStatus};
use crate::reporting::{ErrorReporter, ReportFlow};
use crate::store::CvStore;
use crate::workflow::session::load_session;

/// Why a single formatting attempt failed.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model returned an empty CV")]
    EmptyCv,

    #[error("model returned a {0} instead of a CV object")]
    NotAnObject(&'static str),
}

impl FormatError {
    /// Client errors from the provider (bad key, bad request) will not fix
    /// themselves; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FormatError::Llm(LlmError::Api { status, .. }) => *status == 429 || *status >= 500,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub format_cv: Value,
    pub format_cv_en: Option<Value>,
    /// True when a previously completed CV was returned without a model call.
    pub reused: bool,
    pub attempts: u32,
}

/// Everything the generation pipeline needs. Cheap to clone.
#[derive(Clone)]
pub struct Generator {
    store: Arc<dyn CvStore>,
    llm: Arc<dyn LlmBackend>,
    reporter: ErrorReporter,
    policy: RetryPolicy,
}

impl Generator {
    pub fn new(
        store: Arc<dyn CvStore>,
        llm: Arc<dyn LlmBackend>,
        reporter: ErrorReporter,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            llm,
            reporter,
            policy,
        }
    }

    /// Generates (or returns the already generated) CV for a paid session.
    /// `lang` overrides the language the answers were saved in.
    pub async fn run(&self, session_id: &str, lang: Option<&str>) -> Result<GenerationOutcome, AppError> {
        let session = load_session(self.store.as_ref(), session_id).await?;
        if session.effective_status(chrono::Utc::now()) != SessionStatus::Paid {
            return Err(AppError::PaymentRequired(format!(
                "Session {session_id} has not been paid for"
            )));
        }
        let package = session.package_tier().unwrap_or(PackageTier::Basic);

        let content = self
            .store
            .get_content(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No answers saved for session {session_id}")))?;

        if content.content_status()? == ContentStatus::Completed {
            if let Some(format_cv) = content.format_cv {
                info!("Session {session_id} already generated; returning stored CV");
                return Ok(GenerationOutcome {
                    format_cv,
                    format_cv_en: content.format_cv_en,
                    reused: true,
                    attempts: 0,
                });
            }
        }

        let content = self
            .store
            .begin_processing(session_id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "CV generation for session {session_id} is already in progress"
                ))
            })?;

        let lang = lang
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&content.language)
            .to_string();
        let english_variant = package.includes_english_variant() && !is_english(&lang);
        info!(
            "Generating CV for session {session_id} (lang={lang}, package={package}, english_variant={english_variant})"
        );

        let answers = content.answers;
        let llm = self.llm.as_ref();
        let result = self
            .policy
            .run(
                "CV generation",
                |_| format_cv(llm, &answers, &lang, english_variant),
                FormatError::is_retryable,
            )
            .await;

        match result {
            Ok(((format_cv, format_cv_en), attempts)) => {
                let stored = self
                    .store
                    .complete_processing(session_id, &format_cv, format_cv_en.as_ref())
                    .await?;
                if !stored {
                    warn!("Session {session_id} left processing before completion was stored");
                    return Err(AppError::Conflict(format!(
                        "CV generation for session {session_id} was interrupted"
                    )));
                }
                info!("CV generated for session {session_id} after {attempts} attempt(s)");
                Ok(GenerationOutcome {
                    format_cv,
                    format_cv_en,
                    reused: false,
                    attempts,
                })
            }
            Err(exhausted) => {
                let message = exhausted.last_error.to_string();
                self.store.fail_processing(session_id, &message).await?;
                self.reporter
                    .report(
                        ReportFlow::Generation,
                        Some(session_id),
                        &format!(
                            "CV generation failed after {} attempt(s): {message}",
                            exhausted.attempts
                        ),
                        json!({"lang": lang, "package": package.as_str()}),
                    )
                    .await;
                Err(AppError::Llm(message))
            }
        }
    }
}

fn is_english(lang: &str) -> bool {
    matches!(lang.to_ascii_lowercase().as_str(), "en" | "english")
}

/// One formatting attempt. The English variant, when requested, is produced by
/// a second model call issued concurrently with the first.
async fn format_cv(
    llm: &dyn LlmBackend,
    answers: &Value,
    lang: &str,
    english_variant: bool,
) -> Result<(Value, Option<Value>), FormatError> {
    if english_variant {
        let (primary, english) =
            tokio::try_join!(format_single(llm, answers, lang), format_single(llm, answers, "en"))?;
        Ok((primary, Some(english)))
    } else {
        Ok((format_single(llm, answers, lang).await?, None))
    }
}

async fn format_single(llm: &dyn LlmBackend, answers: &Value, lang: &str) -> Result<Value, FormatError> {
    let answers_json = serde_json::to_string_pretty(answers).map_err(LlmError::Parse)?;
    let prompt = CV_FORMAT_PROMPT_TEMPLATE
        .replace("{language_instruction}", &language_instruction(lang))
        .replace("{answers_json}", &answers_json);
    let system = format!("{CV_FORMAT_SYSTEM} {JSON_ONLY_RULES}");

    let raw: Value = llm.call_json(&prompt, &system).await?;
    validate_cv(raw)
}

/// A formatted CV must be a JSON object that is still non-empty once null and
/// empty values are stripped.
pub fn validate_cv(raw: Value) -> Result<Value, FormatError> {
    match &raw {
        Value::Object(_) => {}
        Value::Array(_) => return Err(FormatError::NotAnObject("array")),
        Value::String(_) => return Err(FormatError::NotAnObject("string")),
        Value::Null => return Err(FormatError::EmptyCv),
        _ => return Err(FormatError::NotAnObject("scalar")),
    }
    strip_empty(raw).ok_or(FormatError::EmptyCv)
}

/// Recursively removes nulls, blank strings, and arrays/objects that end up
/// empty. Returns `None` when nothing is left.
pub fn strip_empty(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(strip_empty).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| strip_empty(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

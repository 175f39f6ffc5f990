use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;

/// Generation progress of a CV content record.
///
/// Allowed transitions:
/// - `Draft -> Processing` (generation starts)
/// - `Processing -> Completed | Error`
/// - `Error -> Processing` (explicit retry)
/// - `Error -> Draft` (answers edited after a failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid content status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ContentStatus,
    pub to: ContentStatus,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Processing => "processing",
            ContentStatus::Completed => "completed",
            ContentStatus::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, next),
            (Draft, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Error, Processing)
                | (Error, Draft)
        )
    }

    pub fn transition(self, next: ContentStatus) -> Result<ContentStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Every status from which `next` is reachable in one step.
    pub fn predecessors(next: ContentStatus) -> Vec<ContentStatus> {
        [
            ContentStatus::Draft,
            ContentStatus::Processing,
            ContentStatus::Completed,
            ContentStatus::Error,
        ]
        .into_iter()
        .filter(|s| s.can_transition_to(next))
        .collect()
    }

    /// Answers may only be edited while no generation is running or done.
    pub fn accepts_answers(self) -> bool {
        matches!(self, ContentStatus::Draft | ContentStatus::Error)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "processing" => Ok(ContentStatus::Processing),
            "completed" => Ok(ContentStatus::Completed),
            "error" => Ok(ContentStatus::Error),
            other => Err(anyhow::anyhow!("unknown content status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvContentRow {
    pub session_id: String,
    pub answers: Value,
    pub language: String,
    pub format_cv: Option<Value>,
    pub format_cv_en: Option<Value>,
    pub status: String,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub pdf_url: Option<String>,
    pub pdf_filename: Option<String>,
    pub pdf_key: Option<String>,
    pub pdf_version: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CvContentRow {
    pub fn content_status(&self) -> anyhow::Result<ContentStatus> {
        self.status.parse()
    }
}

/// Pointer to the latest rendered PDF of a session.
///
/// `version` is the render timestamp in unix millis embedded in `key`.
/// Records are ordered by `(version, key)`; a pointer only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfRecord {
    pub url: String,
    pub filename: String,
    pub key: String,
    pub version: i64,
}

impl PdfRecord {
    /// Whether this record may replace a pointer currently at `(version, key)`.
    pub fn supersedes(&self, current: Option<(i64, &str)>) -> bool {
        match current {
            Some(current) => (self.version, self.key.as_str()) >= current,
            None => true,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CouponRow {
    pub code: String,
    pub package: String,
    pub is_used: bool,
    pub used_by_session: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub kind: &'a str,
    pub title: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ErrorLogRow {
    pub id: Uuid,
    pub flow: String,
    pub session_id: Option<String>,
    pub message: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

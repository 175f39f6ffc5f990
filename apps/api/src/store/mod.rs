//! Persistence seam for every row the service owns.
//!
//! `AppState` carries an `Arc<dyn CvStore>`. `PgStore` is the production
//! backend; `MemoryStore` backs local development without a database and the
//! router tests. Every state change that can race (coupon claims, payment,
//! content status) is a single conditional update in both backends.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::admin::{CouponRow, NewNotification, NotificationRow};
use crate::models::chat::{ChatMessageRow, NewChatMessage};
use crate::models::content::{ContentStatus, CvContentRow, PdfRecord};
use crate::models::session::{NewSession, PackageTier, SessionRow};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Most notifications a single listing returns, newest first.
pub const NOTIFICATION_LIST_LIMIT: usize = 200;

#[async_trait]
pub trait CvStore: Send + Sync {
    // ── sessions ────────────────────────────────────────────────────────────
    async fn insert_session(&self, session: NewSession) -> StoreResult<SessionRow>;

    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRow>>;

    /// `active -> paid`. Returns `false` when the session is missing, was not
    /// `active`, or is past `expires_at`, so a replayed webhook cannot pay twice
    /// and an expired session cannot be paid.
    async fn mark_session_paid(
        &self,
        id: &str,
        package: PackageTier,
        payment_ref: &str,
    ) -> StoreResult<bool>;

    // ── CV content ──────────────────────────────────────────────────────────
    async fn get_content(&self, session_id: &str) -> StoreResult<Option<CvContentRow>>;

    /// Creates the record in `draft`, or replaces the answers of a record that
    /// accepts answers (an `error` record moves back to `draft`).
    /// Returns `None` when the record is `processing` or `completed`.
    async fn upsert_answers(
        &self,
        session_id: &str,
        answers: &Value,
        language: &str,
    ) -> StoreResult<Option<CvContentRow>>;

    /// `draft | error -> processing`, bumping the attempt counter.
    async fn begin_processing(&self, session_id: &str) -> StoreResult<Option<CvContentRow>>;

    /// `processing -> completed`, storing the formatted CV(s).
    async fn complete_processing(
        &self,
        session_id: &str,
        format_cv: &Value,
        format_cv_en: Option<&Value>,
    ) -> StoreResult<bool>;

    /// `processing -> error`, recording the failure text.
    async fn fail_processing(&self, session_id: &str, error_message: &str) -> StoreResult<bool>;

    /// Points the record at `pdf` unless it already holds a newer render
    /// (see `PdfRecord::supersedes`). `false` means missing or superseded.
    async fn set_pdf(&self, session_id: &str, pdf: &PdfRecord) -> StoreResult<bool>;

    async fn list_content_with_status(
        &self,
        status: ContentStatus,
    ) -> StoreResult<Vec<CvContentRow>>;

    // ── chat ────────────────────────────────────────────────────────────────
    async fn append_chat(&self, message: NewChatMessage<'_>) -> StoreResult<ChatMessageRow>;

    async fn list_chat(&self, session_id: &str) -> StoreResult<Vec<ChatMessageRow>>;

    // ── coupons ─────────────────────────────────────────────────────────────
    async fn insert_coupons(
        &self,
        codes: &[String],
        package: PackageTier,
    ) -> StoreResult<Vec<CouponRow>>;

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<CouponRow>>;

    /// Atomically flips `is_used` from `false` to `true`. `None` means the code
    /// does not exist or someone else already claimed it.
    async fn claim_coupon(&self, code: &str, session_id: &str) -> StoreResult<Option<CouponRow>>;

    // ── notifications / error logs ──────────────────────────────────────────
    async fn insert_notification(
        &self,
        notification: NewNotification<'_>,
    ) -> StoreResult<NotificationRow>;

    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<NotificationRow>>;

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_error_log(
        &self,
        flow: &str,
        session_id: Option<&str>,
        message: &str,
        context: &Value,
    ) -> StoreResult<()>;
}

/// Status strings a transition into `next` may start from.
pub(crate) fn allowed_from(next: ContentStatus) -> Vec<String> {
    ContentStatus::predecessors(next)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// Status strings under which answers may be rewritten.
pub(crate) fn answer_statuses() -> Vec<String> {
    [
        ContentStatus::Draft,
        ContentStatus::Processing,
        ContentStatus::Completed,
        ContentStatus::Error,
    ]
    .into_iter()
    .filter(|s| s.accepts_answers())
    .map(|s| s.as_str().to_string())
    .collect()
}

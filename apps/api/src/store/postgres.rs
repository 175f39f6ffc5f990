use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::admin::{CouponRow, NewNotification, NotificationRow};
use crate::models::chat::{ChatMessageRow, NewChatMessage};
use crate::models::content::{ContentStatus, CvContentRow, PdfRecord};
use crate::models::session::{NewSession, PackageTier, SessionRow};
use crate::store::{allowed_from, answer_statuses, CvStore, StoreResult, NOTIFICATION_LIST_LIMIT};

/// PostgreSQL-backed store. Conditional updates carry the expected prior
/// state in their `WHERE` clause; an empty result means another request won.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CvStore for PgStore {
    async fn insert_session(&self, session: NewSession) -> StoreResult<SessionRow> {
        sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, status, template_id, language, metadata, expires_at)
            VALUES ($1, 'active', $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&session.id)
        .bind(&session.template_id)
        .bind(&session.language)
        .bind(&session.metadata)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRow>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn mark_session_paid(
        &self,
        id: &str,
        package: PackageTier,
        payment_ref: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'paid', package = $2, payment_ref = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .bind(package.as_str())
        .bind(payment_ref)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_content(&self, session_id: &str) -> StoreResult<Option<CvContentRow>> {
        sqlx::query_as::<_, CvContentRow>("SELECT * FROM cv_content WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn upsert_answers(
        &self,
        session_id: &str,
        answers: &Value,
        language: &str,
    ) -> StoreResult<Option<CvContentRow>> {
        sqlx::query_as::<_, CvContentRow>(
            r#"
            INSERT INTO cv_content (session_id, answers, language, status)
            VALUES ($1, $2, $3, 'draft')
            ON CONFLICT (session_id) DO UPDATE
            SET answers = EXCLUDED.answers,
                language = EXCLUDED.language,
                status = 'draft',
                error_message = NULL,
                updated_at = NOW()
            WHERE cv_content.status = ANY($4)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(answers)
        .bind(language)
        .bind(answer_statuses())
        .fetch_optional(&self.pool)
        .await
    }

    async fn begin_processing(&self, session_id: &str) -> StoreResult<Option<CvContentRow>> {
        sqlx::query_as::<_, CvContentRow>(
            r#"
            UPDATE cv_content
            SET status = 'processing', attempts = attempts + 1, error_message = NULL,
                updated_at = NOW()
            WHERE session_id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(allowed_from(ContentStatus::Processing))
        .fetch_optional(&self.pool)
        .await
    }

    async fn complete_processing(
        &self,
        session_id: &str,
        format_cv: &Value,
        format_cv_en: Option<&Value>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cv_content
            SET status = 'completed', format_cv = $2, format_cv_en = $3,
                error_message = NULL, updated_at = NOW()
            WHERE session_id = $1 AND status = ANY($4)
            "#,
        )
        .bind(session_id)
        .bind(format_cv)
        .bind(format_cv_en.cloned())
        .bind(allowed_from(ContentStatus::Completed))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_processing(&self, session_id: &str, error_message: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cv_content
            SET status = 'error', error_message = $2, updated_at = NOW()
            WHERE session_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(session_id)
        .bind(error_message)
        .bind(allowed_from(ContentStatus::Error))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_pdf(&self, session_id: &str, pdf: &PdfRecord) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cv_content
            SET pdf_url = $2, pdf_filename = $3, pdf_key = $4, pdf_version = $5,
                updated_at = NOW()
            WHERE session_id = $1
              AND (pdf_version IS NULL OR (pdf_version, pdf_key) <= ($5, $4))
            "#,
        )
        .bind(session_id)
        .bind(&pdf.url)
        .bind(&pdf.filename)
        .bind(&pdf.key)
        .bind(pdf.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_content_with_status(
        &self,
        status: ContentStatus,
    ) -> StoreResult<Vec<CvContentRow>> {
        sqlx::query_as::<_, CvContentRow>(
            "SELECT * FROM cv_content WHERE status = $1 ORDER BY updated_at",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
    }

    async fn append_chat(&self, message: NewChatMessage<'_>) -> StoreResult<ChatMessageRow> {
        sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages (session_id, role, content, language)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(message.session_id)
        .bind(message.role.as_str())
        .bind(message.content)
        .bind(message.language)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_chat(&self, session_id: &str) -> StoreResult<Vec<ChatMessageRow>> {
        sqlx::query_as::<_, ChatMessageRow>(
            "SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_coupons(
        &self,
        codes: &[String],
        package: PackageTier,
    ) -> StoreResult<Vec<CouponRow>> {
        sqlx::query_as::<_, CouponRow>(
            r#"
            INSERT INTO coupons (code, package)
            SELECT code, $2 FROM UNNEST($1::text[]) AS code
            ON CONFLICT (code) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(codes)
        .bind(package.as_str())
        .fetch_all(&self.pool)
        .await
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<CouponRow>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn claim_coupon(&self, code: &str, session_id: &str) -> StoreResult<Option<CouponRow>> {
        sqlx::query_as::<_, CouponRow>(
            r#"
            UPDATE coupons
            SET is_used = TRUE, used_by_session = $2, used_at = NOW()
            WHERE code = $1 AND is_used = FALSE
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert_notification(
        &self,
        notification: NewNotification<'_>,
    ) -> StoreResult<NotificationRow> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (id, kind, title, message)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.kind)
        .bind(notification.title)
        .bind(notification.message)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<NotificationRow>> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE ($1 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(unread_only)
        .bind(NOTIFICATION_LIST_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_error_log(
        &self,
        flow: &str,
        session_id: Option<&str>,
        message: &str,
        context: &Value,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO error_logs (id, flow, session_id, message, context)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(flow)
        .bind(session_id)
        .bind(message)
        .bind(context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::admin::{CouponRow, ErrorLogRow, NewNotification, NotificationRow};
use crate::models::chat::{ChatMessageRow, NewChatMessage};
use crate::models::content::{ContentStatus, CvContentRow, PdfRecord};
use crate::models::session::{NewSession, PackageTier, SessionRow, SessionStatus};
use crate::store::{CvStore, StoreResult, NOTIFICATION_LIST_LIMIT};

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, SessionRow>,
    content: HashMap<String, CvContentRow>,
    chat: Vec<ChatMessageRow>,
    coupons: HashMap<String, CouponRow>,
    notifications: Vec<NotificationRow>,
    error_logs: Vec<ErrorLogRow>,
}

/// Process-local store. The whole table set sits behind one mutex that is
/// never held across an `.await`, so every method is a single atomic step.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn error_logs(&self) -> Vec<ErrorLogRow> {
        self.lock().error_logs.clone()
    }

    #[cfg(test)]
    pub fn put_content(&self, row: CvContentRow) {
        self.lock().content.insert(row.session_id.clone(), row);
    }
}

fn status_of(row: &CvContentRow) -> Option<ContentStatus> {
    row.content_status().ok()
}

/// Moves `row` to `next` when the transition is legal from its current status.
fn advance(row: &mut CvContentRow, next: ContentStatus) -> bool {
    match status_of(row).map(|current| current.transition(next)) {
        Some(Ok(next)) => {
            row.status = next.as_str().to_string();
            row.updated_at = Utc::now();
            true
        }
        _ => false,
    }
}

#[async_trait]
impl CvStore for MemoryStore {
    async fn insert_session(&self, session: NewSession) -> StoreResult<SessionRow> {
        let now = Utc::now();
        let row = SessionRow {
            id: session.id,
            status: SessionStatus::Active.as_str().to_string(),
            template_id: session.template_id,
            language: session.language,
            package: None,
            payment_ref: None,
            metadata: session.metadata,
            expires_at: session.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.lock().sessions.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRow>> {
        Ok(self.lock().sessions.get(id).cloned())
    }

    async fn mark_session_paid(
        &self,
        id: &str,
        package: PackageTier,
        payment_ref: &str,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.sessions.get_mut(id) {
            Some(row)
                if row.status == SessionStatus::Active.as_str() && row.expires_at > Utc::now() =>
            {
                row.status = SessionStatus::Paid.as_str().to_string();
                row.package = Some(package.as_str().to_string());
                row.payment_ref = Some(payment_ref.to_string());
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_content(&self, session_id: &str) -> StoreResult<Option<CvContentRow>> {
        Ok(self.lock().content.get(session_id).cloned())
    }

    async fn upsert_answers(
        &self,
        session_id: &str,
        answers: &Value,
        language: &str,
    ) -> StoreResult<Option<CvContentRow>> {
        let now = Utc::now();
        let mut tables = self.lock();
        match tables.content.get_mut(session_id) {
            Some(row) => {
                if !status_of(row).is_some_and(|s| s.accepts_answers()) {
                    return Ok(None);
                }
                row.answers = answers.clone();
                row.language = language.to_string();
                row.status = ContentStatus::Draft.as_str().to_string();
                row.error_message = None;
                row.updated_at = now;
                Ok(Some(row.clone()))
            }
            None => {
                let row = CvContentRow {
                    session_id: session_id.to_string(),
                    answers: answers.clone(),
                    language: language.to_string(),
                    format_cv: None,
                    format_cv_en: None,
                    status: ContentStatus::Draft.as_str().to_string(),
                    error_message: None,
                    attempts: 0,
                    pdf_url: None,
                    pdf_filename: None,
                    pdf_key: None,
                    pdf_version: None,
                    created_at: now,
                    updated_at: now,
                };
                tables.content.insert(session_id.to_string(), row.clone());
                Ok(Some(row))
            }
        }
    }

    async fn begin_processing(&self, session_id: &str) -> StoreResult<Option<CvContentRow>> {
        let mut tables = self.lock();
        let Some(row) = tables.content.get_mut(session_id) else {
            return Ok(None);
        };
        if !advance(row, ContentStatus::Processing) {
            return Ok(None);
        }
        row.attempts += 1;
        row.error_message = None;
        Ok(Some(row.clone()))
    }

    async fn complete_processing(
        &self,
        session_id: &str,
        format_cv: &Value,
        format_cv_en: Option<&Value>,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(row) = tables.content.get_mut(session_id) else {
            return Ok(false);
        };
        if !advance(row, ContentStatus::Completed) {
            return Ok(false);
        }
        row.format_cv = Some(format_cv.clone());
        row.format_cv_en = format_cv_en.cloned();
        row.error_message = None;
        Ok(true)
    }

    async fn fail_processing(&self, session_id: &str, error_message: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(row) = tables.content.get_mut(session_id) else {
            return Ok(false);
        };
        if !advance(row, ContentStatus::Error) {
            return Ok(false);
        }
        row.error_message = Some(error_message.to_string());
        Ok(true)
    }

    async fn set_pdf(&self, session_id: &str, pdf: &PdfRecord) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(row) = tables.content.get_mut(session_id) else {
            return Ok(false);
        };
        let current = row.pdf_version.zip(row.pdf_key.as_deref());
        if !pdf.supersedes(current) {
            return Ok(false);
        }
        row.pdf_url = Some(pdf.url.clone());
        row.pdf_filename = Some(pdf.filename.clone());
        row.pdf_key = Some(pdf.key.clone());
        row.pdf_version = Some(pdf.version);
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_content_with_status(
        &self,
        status: ContentStatus,
    ) -> StoreResult<Vec<CvContentRow>> {
        let mut rows: Vec<CvContentRow> = self
            .lock()
            .content
            .values()
            .filter(|row| status_of(row) == Some(status))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        Ok(rows)
    }

    async fn append_chat(&self, message: NewChatMessage<'_>) -> StoreResult<ChatMessageRow> {
        let mut tables = self.lock();
        let row = ChatMessageRow {
            id: tables.chat.len() as i64 + 1,
            session_id: message.session_id.to_string(),
            role: message.role.as_str().to_string(),
            content: message.content.to_string(),
            language: message.language.to_string(),
            created_at: Utc::now(),
        };
        tables.chat.push(row.clone());
        Ok(row)
    }

    async fn list_chat(&self, session_id: &str) -> StoreResult<Vec<ChatMessageRow>> {
        Ok(self
            .lock()
            .chat
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_coupons(
        &self,
        codes: &[String],
        package: PackageTier,
    ) -> StoreResult<Vec<CouponRow>> {
        let mut tables = self.lock();
        let mut inserted = Vec::with_capacity(codes.len());
        for code in codes {
            if tables.coupons.contains_key(code) {
                continue;
            }
            let row = CouponRow {
                code: code.clone(),
                package: package.as_str().to_string(),
                is_used: false,
                used_by_session: None,
                used_at: None,
                created_at: Utc::now(),
            };
            tables.coupons.insert(code.clone(), row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<CouponRow>> {
        Ok(self.lock().coupons.get(code).cloned())
    }

    async fn claim_coupon(&self, code: &str, session_id: &str) -> StoreResult<Option<CouponRow>> {
        let mut tables = self.lock();
        match tables.coupons.get_mut(code) {
            Some(row) if !row.is_used => {
                row.is_used = true;
                row.used_by_session = Some(session_id.to_string());
                row.used_at = Some(Utc::now());
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_notification(
        &self,
        notification: NewNotification<'_>,
    ) -> StoreResult<NotificationRow> {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            kind: notification.kind.to_string(),
            title: notification.title.to_string(),
            message: notification.message.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        self.lock().notifications.push(row.clone());
        Ok(row)
    }

    async fn list_notifications(&self, unread_only: bool) -> StoreResult<Vec<NotificationRow>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| !unread_only || !n.is_read)
            .take(NOTIFICATION_LIST_LIMIT)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.notifications.iter_mut().find(|n| n.id == id) {
            Some(row) => {
                row.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_error_log(
        &self,
        flow: &str,
        session_id: Option<&str>,
        message: &str,
        context: &Value,
    ) -> StoreResult<()> {
        self.lock().error_logs.push(ErrorLogRow {
            id: Uuid::new_v4(),
            flow: flow.to_string(),
            session_id: session_id.map(str::to_string),
            message: message.to_string(),
            context: context.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store_with_draft(session_id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_answers(session_id, &json!({"name": "Dana"}), "he")
            .await
            .unwrap()
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_creates_draft_record() {
        let store = store_with_draft("S1").await;
        let row = store.get_content("S1").await.unwrap().unwrap();
        assert_eq!(row.status, "draft");
        assert_eq!(row.answers["name"], "Dana");
    }

    #[tokio::test]
    async fn test_answers_rejected_while_processing() {
        let store = store_with_draft("S1").await;
        assert!(store.begin_processing("S1").await.unwrap().is_some());
        let result = store
            .upsert_answers("S1", &json!({"name": "Other"}), "he")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_begin_processing_is_compare_and_set() {
        let store = store_with_draft("S1").await;
        let first = store.begin_processing("S1").await.unwrap();
        let second = store.begin_processing("S1").await.unwrap();
        assert_eq!(first.unwrap().attempts, 1);
        assert!(second.is_none(), "processing -> processing must be rejected");
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = store_with_draft("S1").await;
        let cv = json!({"name": "Dana"});
        assert!(!store.complete_processing("S1", &cv, None).await.unwrap());
        store.begin_processing("S1").await.unwrap();
        assert!(store.complete_processing("S1", &cv, None).await.unwrap());
        let row = store.get_content("S1").await.unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.format_cv, Some(cv));
    }

    #[tokio::test]
    async fn test_error_record_accepts_new_answers_and_returns_to_draft() {
        let store = store_with_draft("S1").await;
        store.begin_processing("S1").await.unwrap();
        assert!(store.fail_processing("S1", "model timeout").await.unwrap());
        let row = store
            .upsert_answers("S1", &json!({"name": "Dana K"}), "he")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "draft");
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn test_coupon_claim_only_once() {
        let store = MemoryStore::new();
        store
            .insert_coupons(&["RSV-1".to_string()], PackageTier::Pro)
            .await
            .unwrap();
        assert!(store.claim_coupon("RSV-1", "A").await.unwrap().is_some());
        assert!(store.claim_coupon("RSV-1", "B").await.unwrap().is_none());
        let coupon = store.find_coupon("RSV-1").await.unwrap().unwrap();
        assert_eq!(coupon.used_by_session.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_duplicate_coupon_codes_are_skipped() {
        let store = MemoryStore::new();
        let codes = vec!["A1".to_string(), "A1".to_string(), "B2".to_string()];
        let inserted = store.insert_coupons(&codes, PackageTier::Basic).await.unwrap();
        assert_eq!(inserted.len(), 2);
    }

    #[tokio::test]
    async fn test_chat_is_ordered_per_session() {
        let store = MemoryStore::new();
        for (session, text) in [("S1", "hi"), ("S2", "other"), ("S1", "again")] {
            store
                .append_chat(NewChatMessage {
                    session_id: session,
                    role: crate::models::chat::ChatRole::User,
                    content: text,
                    language: "he",
                })
                .await
                .unwrap();
        }
        let transcript = store.list_chat("S1").await.unwrap();
        let texts: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["hi", "again"]);
    }

    #[tokio::test]
    async fn test_notification_listing_is_capped_newest_first() {
        let store = MemoryStore::new();
        for i in 0..NOTIFICATION_LIST_LIMIT + 5 {
            let message = format!("note {i}");
            store
                .insert_notification(NewNotification {
                    kind: "payment",
                    title: "New payment",
                    message: &message,
                })
                .await
                .unwrap();
        }

        let rows = store.list_notifications(false).await.unwrap();
        assert_eq!(rows.len(), NOTIFICATION_LIST_LIMIT);
        assert_eq!(rows[0].message, format!("note {}", NOTIFICATION_LIST_LIMIT + 4));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_marked_paid() {
        let store = MemoryStore::new();
        store
            .insert_session(NewSession {
                id: "EXP".to_string(),
                template_id: "classic".to_string(),
                language: "he".to_string(),
                metadata: json!({}),
                expires_at: Utc::now() - chrono::Duration::minutes(1),
            })
            .await
            .unwrap();

        assert!(!store.mark_session_paid("EXP", PackageTier::Basic, "T-1").await.unwrap());
        let row = store.get_session("EXP").await.unwrap().unwrap();
        assert_eq!(row.status, "active");
    }
}

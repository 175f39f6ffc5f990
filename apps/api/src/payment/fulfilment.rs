use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::queue::{GenerationJob, GenerationQueue};
use crate::models::admin::NewNotification;
use crate::models::session::PackageTier;
use crate::store::CvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidVia {
    Payment,
    Coupon,
}

impl PaidVia {
    fn notification_kind(&self) -> &'static str {
        match self {
            PaidVia::Payment => "payment",
            PaidVia::Coupon => "coupon",
        }
    }

    fn notification_title(&self) -> &'static str {
        match self {
            PaidVia::Payment => "New payment",
            PaidVia::Coupon => "Coupon redeemed",
        }
    }
}

/// Marks the session paid and, if this call won the `active -> paid`
/// transition, notifies the operator and queues generation. Returns whether
/// this call did the transition; a replay returns `false` and has no effects.
pub async fn activate_paid_session(
    store: &dyn CvStore,
    jobs: &GenerationQueue,
    session_id: &str,
    package: PackageTier,
    payment_ref: &str,
    via: PaidVia,
) -> Result<bool, AppError> {
    if !store.mark_session_paid(session_id, package, payment_ref).await? {
        info!("Session {session_id} was already paid or is not active; ignoring {via:?}");
        return Ok(false);
    }
    info!("Session {session_id} paid ({package}, ref {payment_ref})");

    let message = format!("Session {session_id}: {package} package, reference {payment_ref}");
    if let Err(e) = store
        .insert_notification(NewNotification {
            kind: via.notification_kind(),
            title: via.notification_title(),
            message: &message,
        })
        .await
    {
        warn!("Failed to create payment notification: {e}");
    }

    if store.get_content(session_id).await?.is_some() {
        jobs.enqueue(GenerationJob {
            session_id: session_id.to_string(),
            lang: None,
        })
        .await?;
    } else {
        warn!("Session {session_id} paid before any answers were saved; nothing to generate yet");
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{active_session, expired_session};
    use serde_json::json;

    #[tokio::test]
    async fn test_only_first_activation_has_effects() {
        let store = MemoryStore::new();
        active_session(&store, "S1").await;
        store
            .upsert_answers("S1", &json!({"name": "Dana"}), "he")
            .await
            .unwrap();
        let (jobs, mut receiver) = GenerationQueue::new(4);

        let first = activate_paid_session(&store, &jobs, "S1", PackageTier::Pro, "T-1", PaidVia::Payment)
            .await
            .unwrap();
        let replay = activate_paid_session(&store, &jobs, "S1", PackageTier::Pro, "T-1", PaidVia::Payment)
            .await
            .unwrap();

        assert!(first);
        assert!(!replay);
        assert_eq!(receiver.try_recv().unwrap().session_id, "S1");
        assert!(receiver.try_recv().is_err());
        assert_eq!(store.list_notifications(false).await.unwrap().len(), 1);

        let session = store.get_session("S1").await.unwrap().unwrap();
        assert_eq!(session.status, "paid");
        assert_eq!(session.package.as_deref(), Some("pro"));
    }

    #[tokio::test]
    async fn test_paid_without_answers_queues_nothing() {
        let store = MemoryStore::new();
        active_session(&store, "S1").await;
        let (jobs, mut receiver) = GenerationQueue::new(4);

        assert!(activate_paid_session(&store, &jobs, "S1", PackageTier::Basic, "C-1", PaidVia::Coupon)
            .await
            .unwrap());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_expired_session_cannot_be_activated() {
        let store = MemoryStore::new();
        expired_session(&store, "EXP").await;
        let (jobs, mut receiver) = GenerationQueue::new(4);

        let activated =
            activate_paid_session(&store, &jobs, "EXP", PackageTier::Basic, "T-9", PaidVia::Payment)
                .await
                .unwrap();

        assert!(!activated);
        assert!(receiver.try_recv().is_err());
        let session = store.get_session("EXP").await.unwrap().unwrap();
        assert_eq!(session.status, "active");
        assert!(session.payment_ref.is_none());
    }
}

use chrono::Utc;
use tracing::{info, warn};

use crate::coupons::codes::normalize_code;
use crate::errors::AppError;
use crate::generation::queue::GenerationQueue;
use crate::models::admin::CouponRow;
use crate::models::session::{PackageTier, SessionStatus};
use crate::payment::fulfilment::{activate_paid_session, PaidVia};
use crate::store::CvStore;
use crate::workflow::session::{ensure_live, load_session};

/// The coupon behind `raw_code`, if it exists and is still unused.
pub async fn find_usable_coupon(
    store: &dyn CvStore,
    raw_code: &str,
) -> Result<Option<CouponRow>, AppError> {
    let code = normalize_code(raw_code);
    if code.is_empty() {
        return Err(AppError::Validation("couponCode is required".to_string()));
    }
    Ok(store.find_coupon(&code).await?.filter(|c| !c.is_used))
}

/// Claims the coupon for `session_id` and pays the session with the coupon's
/// package. Of several concurrent redemptions of one code exactly one wins;
/// the others get `Conflict`.
pub async fn redeem_coupon(
    store: &dyn CvStore,
    jobs: &GenerationQueue,
    raw_code: &str,
    session_id: &str,
) -> Result<CouponRow, AppError> {
    let code = normalize_code(raw_code);
    if code.is_empty() {
        return Err(AppError::Validation("couponCode is required".to_string()));
    }

    let session = load_session(store, session_id).await?;
    if ensure_live(&session, Utc::now())? == SessionStatus::Paid {
        return Err(AppError::Conflict(format!("Session {session_id} is already paid")));
    }

    if store.find_coupon(&code).await?.is_none() {
        return Err(AppError::NotFound(format!("Unknown coupon {code}")));
    }
    let coupon = store
        .claim_coupon(&code, session_id)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Coupon {code} has already been used")))?;
    info!("Coupon {code} claimed by session {session_id}");

    let package: PackageTier = coupon.package.parse()?;
    let activated = activate_paid_session(
        store,
        jobs,
        session_id,
        package,
        &format!("coupon:{code}"),
        PaidVia::Coupon,
    )
    .await?;
    if !activated {
        warn!("Coupon {code} consumed but session {session_id} was paid concurrently");
    }

    Ok(coupon)
}

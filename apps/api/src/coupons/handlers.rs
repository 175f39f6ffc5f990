//! Axum route handlers for reservist coupons.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::coupons::redeem::{find_usable_coupon, redeem_coupon};
use crate::errors::AppError;
use crate::models::admin::CouponRow;
use crate::models::session::SessionStatus;
use crate::state::AppState;
use crate::workflow::session::next_step_url;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[serde(default)]
    pub coupon_code: String,
}

#[derive(Debug, Serialize)]
pub struct CouponView {
    pub code: String,
    pub package: String,
}

impl From<CouponRow> for CouponView {
    fn from(row: CouponRow) -> Self {
        Self {
            code: row.code,
            package: row.package,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse {
    pub coupon: Option<CouponView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCouponRequest {
    #[serde(default)]
    pub coupon_code: String,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCouponResponse {
    pub success: bool,
    pub package: String,
    pub redirect_url: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/validate-reservist-coupon
///
/// `{coupon: null}` for unknown and already used codes alike.
pub async fn handle_validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, AppError> {
    let coupon = find_usable_coupon(state.store.as_ref(), &request.coupon_code).await?;
    Ok(Json(ValidateCouponResponse {
        coupon: coupon.map(CouponView::from),
    }))
}

/// POST /api/redeem-coupon
pub async fn handle_redeem_coupon(
    State(state): State<AppState>,
    Json(request): Json<RedeemCouponRequest>,
) -> Result<Json<RedeemCouponResponse>, AppError> {
    let coupon = redeem_coupon(
        state.store.as_ref(),
        &state.jobs,
        &request.coupon_code,
        &request.session_id,
    )
    .await?;

    Ok(Json(RedeemCouponResponse {
        success: true,
        package: coupon.package,
        redirect_url: next_step_url(&request.session_id, SessionStatus::Paid),
    }))
}

//! Axum route handlers for the operator dashboard. All routes sit behind
//! `auth::require_admin`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::coupons::codes::{random_codes, MAX_BATCH};
use crate::errors::AppError;
use crate::models::admin::{CouponRow, NotificationRow};
use crate::models::session::PackageTier;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationRow>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateCouponsRequest {
    pub count: usize,
    pub package: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateCouponsResponse {
    pub coupons: Vec<CouponRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/admin/notifications?unread=true
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<NotificationsResponse>, AppError> {
    let notifications = state.store.list_notifications(query.unread).await?;
    Ok(Json(NotificationsResponse { notifications }))
}

/// POST /api/admin/notifications/:id/read
pub async fn handle_mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    if !state.store.mark_notification_read(id).await? {
        return Err(AppError::NotFound(format!("Notification {id} not found")));
    }
    Ok(Json(MarkReadResponse { success: true }))
}

/// POST /api/admin/coupons
///
/// Pre-generates a batch of unused coupon codes for one package.
pub async fn handle_generate_coupons(
    State(state): State<AppState>,
    Json(request): Json<GenerateCouponsRequest>,
) -> Result<Json<GenerateCouponsResponse>, AppError> {
    if request.count == 0 || request.count > MAX_BATCH {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_BATCH}"
        )));
    }
    let package: PackageTier = request
        .package
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown package '{}'", request.package)))?;

    // Codes colliding with existing ones are skipped by the store; top up
    // until the batch is complete.
    let mut coupons = Vec::with_capacity(request.count);
    while coupons.len() < request.count {
        let codes = random_codes(request.count - coupons.len());
        coupons.extend(state.store.insert_coupons(&codes, package).await?);
    }

    info!("Generated {} {package} coupon(s)", coupons.len());
    Ok(Json(GenerateCouponsResponse { coupons }))
}

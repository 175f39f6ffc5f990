//! Axum route handlers for checkout and payment provider callbacks.

use std::collections::HashMap;

use axum::{
    extract::State,
    response::Html,
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::session::{PackageTier, SessionStatus};
use crate::payment::fulfilment::{activate_paid_session, PaidVia};
use crate::payment::gateway::{CallbackStatus, CheckoutClient, PaymentCallback};
use crate::reporting::ReportFlow;
use crate::state::AppState;
use crate::workflow::session::{ensure_live, load_session};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub client: CheckoutClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub received: bool,
}

/// Which provider endpoint delivered a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackSource {
    Success,
    Failure,
    Notify,
}

impl CallbackSource {
    fn as_str(&self) -> &'static str {
        match self {
            CallbackSource::Success => "success",
            CallbackSource::Failure => "failure",
            CallbackSource::Notify => "notify",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/payment/create
///
/// Returns the signed hosted-payment-page URL for an active session.
pub async fn handle_create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, AppError> {
    let package: PackageTier = request
        .package
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown package '{}'", request.package)))?;

    let session = load_session(state.store.as_ref(), &request.session_id).await?;
    if ensure_live(&session, Utc::now())? == SessionStatus::Paid {
        return Err(AppError::Conflict(format!(
            "Session {} is already paid",
            session.id
        )));
    }

    let redirect_url = state
        .payments
        .checkout_url(&session.id, package, &request.client)?;
    info!("Checkout created for session {} ({package})", session.id);

    Ok(Json(CreatePaymentResponse { redirect_url }))
}

/// POST /api/payment/success
///
/// Browser redirect target after a completed payment. Responds with a page
/// that reports the outcome to the window that opened the payment page.
pub async fn handle_payment_success(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Html<String>, AppError> {
    let callback = process_callback(&state, &params, CallbackSource::Success).await?;
    let status = match callback.status {
        CallbackStatus::Approved => "success",
        CallbackStatus::Declined => "failure",
    };
    Ok(result_page(&state.config.public_base_url, status, &callback.session_id))
}

/// POST /api/payment/failure
pub async fn handle_payment_failure(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Html<String>, AppError> {
    let callback = process_callback(&state, &params, CallbackSource::Failure).await?;
    Ok(result_page(&state.config.public_base_url, "failure", &callback.session_id))
}

/// POST /api/payment/notify
///
/// Server-to-server confirmation. May arrive before, after, or instead of
/// the browser redirect.
pub async fn handle_payment_notify(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Json<NotifyResponse>, AppError> {
    process_callback(&state, &params, CallbackSource::Notify).await?;
    Ok(Json(NotifyResponse { received: true }))
}

/// Verifies a callback and applies it. Only an approved callback delivered to
/// the success or notify endpoint can mark a session paid.
async fn process_callback(
    state: &AppState,
    params: &HashMap<String, String>,
    source: CallbackSource,
) -> Result<PaymentCallback, AppError> {
    let callback = match state.payments.verify_callback(params) {
        Ok(callback) => callback,
        Err(e) => {
            let session_id = params.get("sessionId").map(String::as_str);
            state
                .reporter
                .report(
                    ReportFlow::Payment,
                    session_id,
                    &format!("Rejected payment {} callback: {e}", source.as_str()),
                    json!({"source": source.as_str(), "params": redacted(params)}),
                )
                .await;
            return Err(AppError::Unauthorized);
        }
    };

    let approved = callback.status == CallbackStatus::Approved;
    if approved && source != CallbackSource::Failure {
        let session = load_session(state.store.as_ref(), &callback.session_id).await?;
        if let Err(e) = ensure_live(&session, Utc::now()) {
            warn!(
                "Approved payment {} for expired session {}",
                callback.transaction_id, callback.session_id
            );
            state
                .reporter
                .report(
                    ReportFlow::Payment,
                    Some(&callback.session_id),
                    "Approved payment arrived after the session expired",
                    json!({
                        "source": source.as_str(),
                        "package": callback.package.as_str(),
                        "amount": callback.amount,
                        "transaction_id": callback.transaction_id,
                        "expires_at": session.expires_at,
                    }),
                )
                .await;
            return Err(e);
        }
        activate_paid_session(
            state.store.as_ref(),
            &state.jobs,
            &callback.session_id,
            callback.package,
            &callback.transaction_id,
            PaidVia::Payment,
        )
        .await?;
    } else {
        warn!(
            "Payment for session {} not approved (via {})",
            callback.session_id,
            source.as_str()
        );
        state
            .reporter
            .report(
                ReportFlow::Payment,
                Some(&callback.session_id),
                "Payment was declined",
                json!({
                    "source": source.as_str(),
                    "package": callback.package.as_str(),
                    "amount": callback.amount,
                    "transaction_id": callback.transaction_id,
                }),
            )
            .await;
    }

    Ok(callback)
}

/// Callback parameters for the error log, without the signature.
fn redacted(params: &HashMap<String, String>) -> Value {
    params
        .iter()
        .filter(|(k, _)| k.as_str() != "signature")
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Minimal page that posts `{type, status, sessionId}` to the opener (popup
/// checkout) or parent (iframe checkout), then navigates itself if neither exists.
fn result_page(origin: &str, status: &str, session_id: &str) -> Html<String> {
    let message = json!({
        "type": "payment-result",
        "status": status,
        "sessionId": session_id,
    });
    // JSON is valid JS; escape "</" so the payload cannot close the script tag.
    let message = message.to_string().replace("</", "<\\/");
    let origin_js = Value::String(origin.to_string()).to_string().replace("</", "<\\/");
    let fallback = Value::String(format!(
        "{origin}/{}?sessionId={}",
        if status == "success" { "generating" } else { "payment" },
        session_id
    ))
    .to_string()
    .replace("</", "<\\/");

    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body><script>\
(function () {{\
var msg = {message};\
var target = window.opener || (window.parent !== window ? window.parent : null);\
if (target) {{ target.postMessage(msg, {origin_js}); if (window.opener) {{ window.close(); }} }}\
else {{ window.location.replace({fallback}); }}\
}})();\
</script></body></html>"
    ))
}

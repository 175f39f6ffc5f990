pub mod health;


use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{admin, chat, coupons, generation, payment, render, validation, workflow};

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/notifications",
            get(admin::handlers::handle_list_notifications),
        )
        .route(
            "/notifications/:id/read",
            post(admin::handlers::handle_mark_notification_read),
        )
        .route("/coupons", post(admin::handlers::handle_generate_coupons))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions and answers
        .route("/api/sessions", post(workflow::handlers::handle_create_session))
        .route("/api/sessions/:id", get(workflow::handlers::handle_get_session))
        .route(
            "/api/sessions/:id/messages",
            get(chat::handlers::handle_transcript),
        )
        .route("/api/save-cv", post(workflow::handlers::handle_save_cv))
        .route("/api/cv/:session_id", get(workflow::handlers::handle_get_cv))
        .route(
            "/api/validate-content",
            post(validation::handlers::handle_validate_content),
        )
        .route("/api/chat", post(chat::handlers::handle_chat))
        // Generation and rendering
        .route(
            "/api/generate-cv",
            post(generation::handlers::handle_generate_cv),
        )
        .route("/api/translate", post(generation::handlers::handle_translate))
        .route("/api/generate-pdf", post(render::handlers::handle_generate_pdf))
        // Payment and coupons
        .route(
            "/api/payment/create",
            post(payment::handlers::handle_create_payment),
        )
        .route(
            "/api/payment/success",
            post(payment::handlers::handle_payment_success),
        )
        .route(
            "/api/payment/failure",
            post(payment::handlers::handle_payment_failure),
        )
        .route(
            "/api/payment/notify",
            post(payment::handlers::handle_payment_notify),
        )
        .route(
            "/api/validate-reservist-coupon",
            post(coupons::handlers::handle_validate_coupon),
        )
        .route(
            "/api/redeem-coupon",
            post(coupons::handlers::handle_redeem_coupon),
        )
        .nest("/api/admin", admin_routes)
        .with_state(state)
}

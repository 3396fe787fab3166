use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{accounts, admin, auth, bookings, chat, payments};
use crate::models::common::HealthResponse;
use crate::AppState;

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Full HTTP surface with the seller gate in front of every route
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // bookings
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/multi", post(bookings::reserve_beds))
        .route("/bookings/beds/{bed_id}", post(bookings::reserve_bed))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route(
            "/bookings/{id}/chat",
            get(chat::open_conversation).post(chat::send_message),
        )
        .route("/chats", get(chat::chat_list))
        // payments
        .route("/payments/create-checkout-session", post(payments::create_checkout_session))
        .route("/payments/create-payment-intent", post(payments::create_payment_intent))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/success", get(payments::payment_success))
        .route("/payments/cancel", get(payments::payment_cancel))
        .route("/payments/check-payment-status", post(payments::check_payment_status))
        .route(
            "/payments/manual/{booking_id}",
            get(payments::manual_instructions).post(payments::submit_manual_payment),
        )
        .route("/payments/{booking_id}", get(payments::payment_page))
        // reviewers
        .route(
            "/admin/manual-payments/{id}/approve",
            post(admin::approve_manual_payment),
        )
        .route(
            "/admin/manual-payments/{id}/reject",
            post(admin::reject_manual_payment),
        )
        .route("/admin/verifications/{id}/approve", post(admin::approve_verification))
        .route("/admin/verifications/{id}/reject", post(admin::reject_verification))
        // seller onboarding
        .route(
            "/accounts/seller/contract",
            get(accounts::contract_page).post(accounts::accept_contract),
        )
        .route(
            "/accounts/seller/verification",
            get(accounts::verification_status).post(accounts::submit_verification),
        )
        .route("/accounts/seller/pending", get(accounts::pending_page))
        .route("/accounts/logout", post(accounts::logout))
        .layer(middleware::from_fn_with_state(state.clone(), auth::seller_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

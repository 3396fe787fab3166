use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;

use crate::error::ApiError;
use crate::handlers::auth::CurrentUser;
use crate::models::common::{NoticeLevel, NoticeResponse};
use crate::models::payment::{
    BookingIdRequest, CheckoutSessionResponse, ManualInstructionsResponse, ManualPaymentRequest,
    PaymentIntentResponse, PaymentPageResponse, PaymentStatusResponse, PaymentSuccessResponse,
    SuccessQuery, WebhookAck,
};
use crate::services::gateway::SIGNATURE_HEADER;
use crate::services::manual_payment::{self, SubmitOutcome};
use crate::services::reconciliation::{self, WebhookOutcome};
use crate::AppState;

/// GET /payments/{booking_id}
pub async fn payment_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<PaymentPageResponse>, ApiError> {
    let page = reconciliation::payment_page(&state.db, &state.config, user.id(), booking_id).await?;
    Ok(Json(page))
}

/// POST /payments/create-checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BookingIdRequest>,
) -> Result<Json<CheckoutSessionResponse>, ApiError> {
    let session = reconciliation::create_checkout_session(
        &state.db,
        state.gateway.as_ref(),
        &state.config,
        user.id(),
        payload.booking_id,
    )
    .await?;

    Ok(Json(CheckoutSessionResponse {
        session_url: session.url,
    }))
}

/// POST /payments/create-payment-intent
pub async fn create_payment_intent(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BookingIdRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let intent = reconciliation::create_payment_intent(
        &state.db,
        state.gateway.as_ref(),
        &state.config,
        user.id(),
        payload.booking_id,
    )
    .await?;

    Ok(Json(intent))
}

/// POST /payments/webhook
///
/// Takes the raw body: the signature covers the exact bytes delivered.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = reconciliation::handle_webhook(
        &state.db,
        &state.config,
        &body,
        signature,
        Utc::now().timestamp(),
    )
    .await?;

    Ok(Json(WebhookAck {
        received: true,
        duplicate: outcome == WebhookOutcome::Duplicate,
    }))
}

/// GET /payments/success?session_id=...
pub async fn payment_success(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<PaymentSuccessResponse>, ApiError> {
    let summary = reconciliation::reconcile_success(
        &state.db,
        state.gateway.as_ref(),
        &state.config,
        user.id(),
        query.session_id.as_deref(),
    )
    .await?;

    Ok(Json(summary))
}

/// GET /payments/cancel
pub async fn payment_cancel() -> Json<NoticeResponse> {
    Json(
        NoticeResponse::new(
            NoticeLevel::Info,
            "Payment was cancelled. You can pay later from your bookings.",
        )
        .redirect_to("/bookings/mine"),
    )
}

/// POST /payments/check-payment-status
pub async fn check_payment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<BookingIdRequest>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let status = reconciliation::check_payment_status(
        &state.db,
        state.gateway.as_ref(),
        &state.config,
        user.id(),
        payload.booking_id,
    )
    .await?;

    Ok(Json(status))
}

/// GET /payments/manual/{booking_id}
pub async fn manual_instructions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<ManualInstructionsResponse>, ApiError> {
    let instructions =
        manual_payment::instructions(&state.db, &state.config, user.id(), booking_id).await?;
    Ok(Json(instructions))
}

/// POST /payments/manual/{booking_id}
pub async fn submit_manual_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
    Json(payload): Json<ManualPaymentRequest>,
) -> Result<Json<NoticeResponse>, ApiError> {
    let outcome = manual_payment::submit_proof(&state.db, user.id(), booking_id, payload).await?;

    let response = match outcome {
        SubmitOutcome::Submitted(_) => NoticeResponse::new(
            NoticeLevel::Success,
            "Payment proof submitted. It will be reviewed shortly.",
        )
        .redirect_to(format!("/payments/manual/{}", booking_id)),
        SubmitOutcome::AlreadyApproved(_) => {
            NoticeResponse::new(NoticeLevel::Info, "This manual payment was already approved.")
                .redirect_to("/payments/success")
        }
        SubmitOutcome::AlreadyPaid => {
            NoticeResponse::new(NoticeLevel::Info, "This booking is already paid.")
                .redirect_to("/bookings/mine")
        }
    };

    Ok(Json(response))
}

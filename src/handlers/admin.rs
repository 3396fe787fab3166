//! Reviewer actions: manual payment proofs and seller verifications
//!
//! Guarded by the `x-api-key` header rather than a user identity.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::error::ApiError;
use crate::handlers::auth::check_admin_auth;
use crate::models::account::VerificationView;
use crate::models::payment::{ManualPaymentSummary, ReviewRequest};
use crate::services::accounts::{self, VerificationDecision};
use crate::services::manual_payment;
use crate::AppState;

/// POST /admin/manual-payments/{id}/approve
pub async fn approve_manual_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ManualPaymentSummary>, ApiError> {
    check_admin_auth(&headers, &state)?;

    let (approved, _) = manual_payment::approve(&state.db, &state.config, id, &payload.reviewer).await?;
    Ok(Json(ManualPaymentSummary::from(approved)))
}

/// POST /admin/manual-payments/{id}/reject
pub async fn reject_manual_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ManualPaymentSummary>, ApiError> {
    check_admin_auth(&headers, &state)?;

    let rejected = manual_payment::reject(&state.db, id, &payload.reviewer, payload.reason).await?;
    Ok(Json(ManualPaymentSummary::from(rejected)))
}

/// POST /admin/verifications/{id}/approve
pub async fn approve_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<VerificationView>, ApiError> {
    check_admin_auth(&headers, &state)?;

    let record = accounts::review_verification(&state.db, id, VerificationDecision::Approve).await?;
    Ok(Json(VerificationView::from(record)))
}

/// POST /admin/verifications/{id}/reject
pub async fn reject_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<VerificationView>, ApiError> {
    check_admin_auth(&headers, &state)?;

    let record =
        accounts::review_verification(&state.db, id, VerificationDecision::Reject(payload.reason))
            .await?;
    Ok(Json(VerificationView::from(record)))
}

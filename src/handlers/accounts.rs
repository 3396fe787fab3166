use axum::{extract::State, http::HeaderMap, Json};

use crate::error::{ApiError, ServiceError};
use crate::handlers::auth::{client_ip, CurrentUser};
use crate::models::account::{
    ContractResponse, SubmitVerificationRequest, VerificationStatusResponse, VerificationView,
};
use crate::models::common::{NoticeLevel, NoticeResponse};
use crate::services::accounts;
use crate::AppState;

pub const CONTRACT_TEXT: &str = "By listing property on this platform the owner confirms they hold the right \
to rent it, agrees to keep all renter communication inside the platform until a booking is paid, and \
accepts that the platform commission is collected from renters before contact details are shared.";

fn contract_response(user: &CurrentUser) -> Result<ContractResponse, ServiceError> {
    let profile = user
        .0
        .seller_profile()
        .ok_or_else(|| ServiceError::Forbidden("This page is for property owners only".to_string()))?;

    Ok(ContractResponse {
        accepted: profile.contract_accepted,
        accepted_at: profile.contract_accepted_at,
        contract_text: CONTRACT_TEXT.to_string(),
    })
}

/// GET /accounts/seller/contract
pub async fn contract_page(user: CurrentUser) -> Result<Json<ContractResponse>, ApiError> {
    Ok(Json(contract_response(&user)?))
}

/// POST /accounts/seller/contract
pub async fn accept_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: CurrentUser,
) -> Result<Json<ContractResponse>, ApiError> {
    let updated = accounts::accept_contract(&state.db, &user.0, client_ip(&headers)).await?;

    Ok(Json(ContractResponse {
        accepted: updated.contract_accepted,
        accepted_at: updated.contract_accepted_at,
        contract_text: CONTRACT_TEXT.to_string(),
    }))
}

/// GET /accounts/seller/verification
pub async fn verification_status(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<VerificationStatusResponse>, ApiError> {
    if user.0.seller_profile().is_none() {
        return Err(ServiceError::Forbidden("This page is for property owners only".to_string()).into());
    }

    let verification = accounts::verification_for(&state.db, user.id()).await?;
    Ok(Json(VerificationStatusResponse {
        verification: verification.map(VerificationView::from),
    }))
}

/// POST /accounts/seller/verification
pub async fn submit_verification(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SubmitVerificationRequest>,
) -> Result<Json<VerificationView>, ApiError> {
    let record = accounts::submit_verification(
        &state.db,
        &user.0,
        &payload.id_document_path,
        &payload.ownership_document_path,
    )
    .await?;

    Ok(Json(VerificationView::from(record)))
}

/// GET /accounts/seller/pending
pub async fn pending_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<VerificationStatusResponse>, ApiError> {
    verification_status(State(state), user).await
}

/// POST /accounts/logout
///
/// Sessions live upstream; this only tells the client where to go.
pub async fn logout() -> Json<NoticeResponse> {
    Json(NoticeResponse::new(NoticeLevel::Info, "You have been logged out").redirect_to("/"))
}

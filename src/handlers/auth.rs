//! Request identity, the seller onboarding gate and reviewer authentication
//!
//! Authentication itself happens upstream; this service trusts the
//! `x-user-id` header it is handed.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::error::{ApiError, ServiceError};
use crate::models::common::{ErrorResponse, NoticeLevel, NoticeResponse};
use crate::services::accounts::{self, Account};
use crate::services::seller_gate::{self, GateDecision};
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<i32> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Client address as reported by the fronting proxy
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// The authenticated account; rejects with 401 when absent or unknown
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.0.id()
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // loaded once by the gate when it ran
        if let Some(account) = parts.extensions.get::<Account>() {
            return Ok(CurrentUser(account.clone()));
        }

        let user_id = user_id_from_headers(&parts.headers).ok_or(ServiceError::Unauthenticated)?;
        let account = accounts::load_account(&state.db, user_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::Unauthenticated)?;

        Ok(CurrentUser(account))
    }
}

/// Middleware applying the seller onboarding gate to every request
pub async fn seller_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let account = match user_id_from_headers(request.headers()) {
        Some(user_id) => match accounts::load_account(&state.db, user_id).await {
            Ok(account) => account,
            Err(e) => return ApiError::from(ServiceError::from(e)).into_response(),
        },
        None => None,
    };

    match seller_gate::evaluate(account.as_ref(), request.uri().path()) {
        GateDecision::Pass => {
            if let Some(account) = account {
                request.extensions_mut().insert(account);
            }
            next.run(request).await
        }
        GateDecision::Redirect { target, notice } => {
            tracing::debug!(path = %request.uri().path(), target, "Seller gate redirect");
            (
                StatusCode::SEE_OTHER,
                [(header::LOCATION, target)],
                Json(NoticeResponse::new(NoticeLevel::Warning, notice).redirect_to(target)),
            )
                .into_response()
        }
    }
}

/// Reviewer endpoints require `x-api-key` to match `ADMIN_API_KEY`
pub fn check_admin_auth(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let Some(admin_key) = state.config.admin_api_key.as_deref() else {
        error!("ADMIN_API_KEY not configured");
        return Err(ServiceError::Configuration("ADMIN_API_KEY not configured".to_string()).into());
    };

    let provided_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided_key != admin_key {
        warn!("Invalid or missing API key");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or missing API key".to_string(),
                code: Some("UNAUTHORIZED".to_string()),
                order_id: None,
            }),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id_from_headers(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" 42 "));
        assert_eq!(user_id_from_headers(&headers), Some(42));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(user_id_from_headers(&headers), None);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::entities::booking_orders::PaymentMethod;
use crate::error::{ApiError, ServiceError};
use crate::handlers::auth::CurrentUser;
use crate::models::booking::{
    BookingSummary, MultiBookingRequest, MultiBookingResponse, MyBookingsResponse,
    ReserveBedRequest, ReserveBedResponse,
};
use crate::models::common::{NoticeLevel, NoticeResponse};
use crate::services::booking::{self, Stay};
use crate::services::reconciliation;
use crate::AppState;

/// GET /bookings/mine
pub async fn my_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MyBookingsResponse>, ApiError> {
    let bookings = booking::my_bookings(&state.db, user.id()).await?;
    Ok(Json(MyBookingsResponse {
        bookings: bookings.into_iter().map(BookingSummary::from).collect(),
    }))
}

/// POST /bookings/beds/{bed_id}
pub async fn reserve_bed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bed_id): Path<i32>,
    Json(payload): Json<ReserveBedRequest>,
) -> Result<Json<ReserveBedResponse>, ApiError> {
    let today = Utc::now().date_naive();
    let stay = Stay::parse(&payload.start_date, &payload.end_date, today)?;

    let created = booking::reserve_bed(
        &state.db,
        user.id(),
        bed_id,
        stay,
        payload.notes,
        state.config.default_commission,
    )
    .await?;

    Ok(Json(ReserveBedResponse {
        payment_url: format!("/payments/{}", created.id),
        notice: "Booking created. Please complete the commission payment.".to_string(),
        booking: BookingSummary::from(created),
    }))
}

/// POST /bookings/multi
///
/// Request `{bed_ids, start_date, end_date, payment_method}`; response
/// `{session_url | manual_url, order_id}` or `{error}`. The order is
/// committed before checkout opens, so a checkout failure still reports
/// `order_id`; payment can be retried through
/// `/payments/create-checkout-session` with any member booking.
pub async fn reserve_beds(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<MultiBookingRequest>,
) -> Result<Json<MultiBookingResponse>, ApiError> {
    let today = Utc::now().date_naive();
    let stay = Stay::parse(&payload.start_date, &payload.end_date, today)?;

    let reservation = booking::reserve_beds(
        &state.db,
        user.id(),
        &payload.bed_ids,
        stay,
        payload.payment_method,
        state.config.default_commission,
    )
    .await?;

    let order_id = reservation.order.id;

    match payload.payment_method {
        PaymentMethod::Card => {
            let session = reconciliation::start_order_checkout(
                &state.db,
                state.gateway.as_ref(),
                &state.config,
                &reservation.order,
                &reservation.bookings,
            )
            .await
            .map_err(|e| {
                let (status, Json(mut body)) = ApiError::from(e);
                body.order_id = Some(order_id);
                (status, Json(body))
            })?;

            Ok(Json(MultiBookingResponse {
                session_url: Some(session.url),
                manual_url: None,
                order_id,
            }))
        }
        PaymentMethod::Manual => {
            let lead = reservation.lead_booking_id().ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} has no bookings", order_id))
            })?;

            Ok(Json(MultiBookingResponse {
                session_url: None,
                manual_url: Some(format!("/payments/manual/{}", lead)),
                order_id,
            }))
        }
    }
}

/// POST /bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<NoticeResponse>, ApiError> {
    let today = Utc::now().date_naive();
    booking::cancel_booking(&state.db, user.id(), booking_id, today).await?;

    Ok(Json(
        NoticeResponse::new(NoticeLevel::Success, "Booking cancelled").redirect_to("/bookings/mine"),
    ))
}

//! Payment reconciliation
//!
//! Every path that learns a commission was paid (webhook, success-page
//! redirect, status poll, manual approval) ends in `mark_target_paid`.
//! Its commit point is a conditional update on `payment_status`, so
//! racing or repeated triggers collapse into one state change.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::AppConfig;
use crate::entities::beds::BedStatus;
use crate::entities::booking_orders::{self, OrderStatus};
use crate::entities::bookings::{self, BookingStatus, PaymentStatus};
use crate::entities::payments::{self, CardPaymentStatus};
use crate::entities::prelude::*;
use crate::entities::webhook_events;
use crate::error::ServiceError;
use crate::models::booking::BookingSummary;
use crate::models::payment::{
    PaymentIntentResponse, PaymentPageResponse, PaymentStatusResponse, PaymentSuccessResponse,
    PaymentSummary,
};
use crate::services::booking::{
    commission_due, competing_paid_booking, ensure_bed_still_free, owned_booking,
};
use crate::services::gateway::{
    self, CheckoutRequest, CheckoutSession, GatewayError, LineItem, PaymentGateway,
    PaymentTarget, SessionDetails, METADATA_BOOKING_ID, METADATA_USER_ID,
};
use crate::services::inventory;

/// Sessions inspected by the status poll
pub const RECENT_SESSION_LIMIT: u32 = 10;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    /// This call performed the transition for `bookings` rows
    Applied { bookings: u64 },
    /// Another trigger got there first
    AlreadyPaid,
    /// A different booking already won the bed for these dates; nothing changed
    BedTaken { booking_id: i32 },
}

// ---------------------------------------------------------------------------
// Mark paid
// ---------------------------------------------------------------------------

/// Bookings covered by a payment target; order members always settle together
async fn target_bookings<C: ConnectionTrait>(
    db: &C,
    target: PaymentTarget,
) -> Result<(Option<i32>, Vec<bookings::Model>), ServiceError> {
    let order_id = match target {
        PaymentTarget::Order(order_id) => order_id,
        PaymentTarget::Booking(booking_id) => {
            let booking = Bookings::find_by_id(booking_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;
            match booking.order_id {
                Some(order_id) => order_id,
                None => return Ok((None, vec![booking])),
            }
        }
    };

    let members = Bookings::find()
        .filter(bookings::Column::OrderId.eq(order_id))
        .order_by_asc(bookings::Column::Id)
        .all(db)
        .await?;
    if members.is_empty() {
        return Err(ServiceError::NotFound(format!("Order {} has no bookings", order_id)));
    }
    Ok((Some(order_id), members))
}

/// Get-or-create the card payment row for a booking and mark it succeeded
async fn record_succeeded_payment(
    txn: &DatabaseTransaction,
    booking: &bookings::Model,
    payment_intent_id: Option<String>,
    currency: &str,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let existing = Payments::find()
        .filter(payments::Column::BookingId.eq(booking.id))
        .one(txn)
        .await?;

    match existing {
        Some(payment) => {
            if payment.status == CardPaymentStatus::Succeeded {
                return Ok(());
            }
            let keep_intent = payment.payment_intent_id.clone();
            let mut active = payment.into_active_model();
            active.status = Set(CardPaymentStatus::Succeeded);
            active.failure_reason = Set(None);
            if keep_intent.is_none() {
                active.payment_intent_id = Set(payment_intent_id);
            }
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            payments::ActiveModel {
                booking_id: Set(booking.id),
                payment_intent_id: Set(payment_intent_id),
                charge_id: Set(None),
                amount: Set(booking.commission_amount),
                currency: Set(currency.to_uppercase()),
                status: Set(CardPaymentStatus::Succeeded),
                failure_reason: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

/// Flip a booking (or its whole order) to confirmed/paid, exactly once.
pub async fn mark_target_paid(
    db: &DatabaseConnection,
    target: PaymentTarget,
    payment_intent_id: Option<String>,
    currency: &str,
) -> Result<MarkPaidOutcome, ServiceError> {
    let txn = db.begin().await?;
    let outcome = apply_paid(&txn, target, payment_intent_id, currency).await?;
    txn.commit().await?;
    Ok(outcome)
}

/// The mark-paid transition inside a caller's transaction
pub async fn apply_paid(
    txn: &DatabaseTransaction,
    target: PaymentTarget,
    payment_intent_id: Option<String>,
    currency: &str,
) -> Result<MarkPaidOutcome, ServiceError> {
    let now = Utc::now();

    let (order_id, members) = target_bookings(txn, target).await?;
    let ids: Vec<i32> = members.iter().map(|b| b.id).collect();

    for booking in members.iter().filter(|b| !b.is_paid()) {
        if let Some(holder) = competing_paid_booking(txn, booking).await? {
            tracing::warn!(
                ?target,
                booking_id = booking.id,
                bed_id = booking.bed_id,
                holder_booking_id = holder.id,
                "Payment received for a bed already won by another booking; refund required"
            );
            return Ok(MarkPaidOutcome::BedTaken {
                booking_id: booking.id,
            });
        }
    }

    let updated = Bookings::update_many()
        .set(bookings::ActiveModel {
            payment_status: Set(PaymentStatus::Paid),
            status: Set(BookingStatus::Confirmed),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(bookings::Column::Id.is_in(ids))
        .filter(bookings::Column::PaymentStatus.ne(PaymentStatus::Paid))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        tracing::debug!(?target, "Already paid, nothing to do");
        return Ok(MarkPaidOutcome::AlreadyPaid);
    }

    // intent ids are unique; only the first member's payment carries it
    let mut intent = payment_intent_id;
    for booking in members.iter().filter(|b| !b.is_paid()) {
        record_succeeded_payment(txn, booking, intent.take(), currency).await?;

        match inventory::get_bed(txn, booking.bed_id).await? {
            // held for a later, non-overlapping stay
            Some(listing) if listing.bed.status == BedStatus::Booked => {}
            Some(_) => inventory::set_bed_status(txn, booking.bed_id, BedStatus::Booked).await?,
            None => tracing::warn!(booking_id = booking.id, bed_id = booking.bed_id, "Bed missing"),
        }
    }

    if let Some(order_id) = order_id {
        BookingOrders::update_many()
            .set(booking_orders::ActiveModel {
                status: Set(OrderStatus::Paid),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(booking_orders::Column::Id.eq(order_id))
            .filter(booking_orders::Column::Status.eq(OrderStatus::Pending))
            .exec(txn)
            .await?;
    }

    tracing::info!(
        ?target,
        ?order_id,
        bookings = updated.rows_affected,
        "Commission payment confirmed"
    );
    Ok(MarkPaidOutcome::Applied {
        bookings: updated.rows_affected,
    })
}

pub async fn mark_booking_paid(
    db: &DatabaseConnection,
    booking_id: i32,
    payment_intent_id: Option<String>,
    currency: &str,
) -> Result<MarkPaidOutcome, ServiceError> {
    mark_target_paid(db, PaymentTarget::Booking(booking_id), payment_intent_id, currency).await
}

pub async fn mark_order_paid(
    db: &DatabaseConnection,
    order_id: i32,
    payment_intent_id: Option<String>,
    currency: &str,
) -> Result<MarkPaidOutcome, ServiceError> {
    mark_target_paid(db, PaymentTarget::Order(order_id), payment_intent_id, currency).await
}

/// Record a failed card attempt; a booking that is already paid stays paid
pub async fn mark_payment_failed(
    db: &DatabaseConnection,
    payment_intent_id: &str,
    booking_hint: Option<i32>,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let payment = Payments::find()
        .filter(payments::Column::PaymentIntentId.eq(payment_intent_id))
        .one(&txn)
        .await?;

    let booking_id = match payment {
        Some(payment) => {
            let booking_id = payment.booking_id;
            if payment.status != CardPaymentStatus::Succeeded {
                let mut active = payment.into_active_model();
                active.status = Set(CardPaymentStatus::Failed);
                active.failure_reason = Set(reason.clone());
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            Some(booking_id)
        }
        None => booking_hint,
    };

    if let Some(booking_id) = booking_id {
        Bookings::update_many()
            .set(bookings::ActiveModel {
                payment_status: Set(PaymentStatus::Failed),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(bookings::Column::Id.eq(booking_id))
            .filter(bookings::Column::PaymentStatus.ne(PaymentStatus::Paid))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::warn!(
        payment_intent_id,
        ?booking_id,
        reason = reason.as_deref().unwrap_or("unknown"),
        "Card payment failed"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Checkout and intents
// ---------------------------------------------------------------------------

/// Bookings a new card payment would settle, refusing any bed already won
async fn payable(
    db: &DatabaseConnection,
    booking: &bookings::Model,
) -> Result<Vec<bookings::Model>, ServiceError> {
    if booking.is_paid() {
        return Err(ServiceError::Validation("This booking is already paid".to_string()));
    }
    if booking.status == BookingStatus::Cancelled {
        return Err(ServiceError::Validation("This booking was cancelled".to_string()));
    }

    settleable_members(db, booking).await
}

/// Every booking settled together with this one, provided none of their beds
/// has been won by another renter in the meantime
pub async fn settleable_members<C: ConnectionTrait>(
    db: &C,
    booking: &bookings::Model,
) -> Result<Vec<bookings::Model>, ServiceError> {
    let (_, members) = target_bookings(db, PaymentTarget::Booking(booking.id)).await?;
    for member in members.iter().filter(|b| !b.is_paid()) {
        ensure_bed_still_free(db, member).await?;
    }
    Ok(members)
}

fn line_item(name: String, amount: Decimal) -> Result<LineItem, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::Validation(
            "Commission amount must be greater than zero".to_string(),
        ));
    }
    Ok(LineItem {
        name,
        unit_amount: gateway::to_minor_units(amount)?,
        quantity: 1,
    })
}

/// Open a hosted checkout covering every booking of an order, one line per bed
pub async fn start_order_checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    order: &booking_orders::Model,
    members: &[bookings::Model],
) -> Result<CheckoutSession, ServiceError> {
    let line_items = members
        .iter()
        .map(|b| line_item(format!("Bed {} (Booking #{})", b.bed_id, b.id), b.commission_amount))
        .collect::<Result<Vec<_>, _>>()?;

    let session = gateway
        .create_checkout_session(CheckoutRequest {
            line_items,
            currency: config.currency.clone(),
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
            target: PaymentTarget::Order(order.id),
        })
        .await
        .map_err(|e| {
            tracing::error!(order_id = order.id, error = %e, "Checkout session creation failed");
            e
        })?;

    let mut active = order.clone().into_active_model();
    active.checkout_session_id = Set(Some(session.id.clone()));
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    tracing::info!(order_id = order.id, session_id = %session.id, "Order checkout session created");
    Ok(session)
}

/// Hosted checkout for one of the viewer's bookings
pub async fn create_checkout_session(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    viewer_id: i32,
    booking_id: i32,
) -> Result<CheckoutSession, ServiceError> {
    let booking = owned_booking(db, booking_id, viewer_id).await?;
    let members = payable(db, &booking).await?;

    if let Some(order_id) = booking.order_id {
        let order = BookingOrders::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        return start_order_checkout(db, gateway, config, &order, &members).await;
    }

    let item = line_item(format!("Booking #{}", booking.id), booking.commission_amount)?;
    let session = gateway
        .create_checkout_session(CheckoutRequest {
            line_items: vec![item],
            currency: config.currency.clone(),
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
            target: PaymentTarget::Booking(booking.id),
        })
        .await
        .map_err(|e| {
            tracing::error!(booking_id, error = %e, "Checkout session creation failed");
            e
        })?;

    tracing::info!(booking_id, session_id = %session.id, "Checkout session created");
    Ok(session)
}

/// Card intent for an embedded payment form; the Payment row is created pending
pub async fn create_payment_intent(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    viewer_id: i32,
    booking_id: i32,
) -> Result<PaymentIntentResponse, ServiceError> {
    let booking = owned_booking(db, booking_id, viewer_id).await?;
    payable(db, &booking).await?;

    // charged for the whole order; the row records this member's share only,
    // the other members get theirs when the order settles
    let amount = commission_due(db, &booking).await?;
    let item = line_item(format!("Booking #{}", booking.id), amount)?;

    let mut metadata = HashMap::new();
    metadata.insert(METADATA_BOOKING_ID.to_string(), booking.id.to_string());
    metadata.insert(METADATA_USER_ID.to_string(), viewer_id.to_string());

    let intent = gateway
        .create_payment_intent(item.unit_amount, &config.currency, metadata)
        .await
        .map_err(|e| {
            tracing::error!(booking_id, error = %e, "Payment intent creation failed");
            e
        })?;

    let now = Utc::now();
    let existing = Payments::find()
        .filter(payments::Column::BookingId.eq(booking.id))
        .one(db)
        .await?;

    match existing {
        Some(payment) => {
            let mut active = payment.into_active_model();
            active.payment_intent_id = Set(Some(intent.id.clone()));
            active.amount = Set(booking.commission_amount);
            active.status = Set(CardPaymentStatus::Pending);
            active.failure_reason = Set(None);
            active.updated_at = Set(now);
            active.update(db).await?;
        }
        None => {
            payments::ActiveModel {
                booking_id: Set(booking.id),
                payment_intent_id: Set(Some(intent.id.clone())),
                charge_id: Set(None),
                amount: Set(booking.commission_amount),
                currency: Set(config.currency.to_uppercase()),
                status: Set(CardPaymentStatus::Pending),
                failure_reason: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    tracing::info!(booking_id, payment_intent_id = %intent.id, "Payment intent created");
    Ok(PaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    })
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Event id seen and fully processed before
    Duplicate,
    /// Recorded but carried nothing to apply
    Ignored,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    last_payment_error: Option<IntentError>,
    #[serde(default)]
    latest_charge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntentError {
    message: Option<String>,
}

fn webhook_error(err: GatewayError) -> ServiceError {
    match err {
        GatewayError::Configuration(msg) => ServiceError::Configuration(msg),
        other => {
            tracing::warn!(error = %other, "Rejected webhook delivery");
            ServiceError::InvalidWebhook(other.to_string())
        }
    }
}

/// Verify, record and apply one gateway webhook delivery.
///
/// The event row is written before anything is applied. A processed
/// event is never applied again; an unprocessed one (earlier failure) is
/// retried on redelivery.
pub async fn handle_webhook(
    db: &DatabaseConnection,
    config: &AppConfig,
    payload: &[u8],
    signature: Option<&str>,
    now: i64,
) -> Result<WebhookOutcome, ServiceError> {
    if config.gateway_webhook_secret.is_empty() {
        tracing::error!("Webhook secret not configured");
        return Err(ServiceError::Configuration(
            "webhook signing secret is not configured".to_string(),
        ));
    }

    let signature = signature
        .ok_or_else(|| ServiceError::InvalidWebhook("missing signature header".to_string()))?;

    let event = gateway::construct_event(
        payload,
        signature,
        &config.gateway_webhook_secret,
        config.webhook_tolerance_secs,
        now,
    )
    .map_err(webhook_error)?;

    WebhookEvents::insert(webhook_events::ActiveModel {
        event_id: Set(event.id.clone()),
        event_type: Set(event.event_type.clone()),
        processed: Set(false),
        payload: Set(String::from_utf8_lossy(payload).into_owned()),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(webhook_events::Column::EventId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    let record = WebhookEvents::find()
        .filter(webhook_events::Column::EventId.eq(event.id.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Webhook event {} not recorded", event.id)))?;

    if record.processed {
        tracing::info!(event_id = %event.id, "Duplicate webhook delivery skipped");
        return Ok(WebhookOutcome::Duplicate);
    }

    let outcome = match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            let session: SessionDetails = serde_json::from_value(event.data.object.clone())
                .map_err(|e| ServiceError::InvalidWebhook(format!("bad session object: {}", e)))?;
            apply_completed_session(db, config, &session).await?
        }
        EVENT_INTENT_SUCCEEDED => {
            let intent: IntentObject = serde_json::from_value(event.data.object.clone())
                .map_err(|e| ServiceError::InvalidWebhook(format!("bad intent object: {}", e)))?;
            apply_intent_succeeded(db, config, &intent).await?
        }
        EVENT_INTENT_FAILED => {
            let intent: IntentObject = serde_json::from_value(event.data.object.clone())
                .map_err(|e| ServiceError::InvalidWebhook(format!("bad intent object: {}", e)))?;
            let hint = PaymentTarget::from_metadata(&intent.metadata).and_then(|t| match t {
                PaymentTarget::Booking(id) => Some(id),
                PaymentTarget::Order(_) => None,
            });
            let reason = intent.last_payment_error.and_then(|e| e.message);
            mark_payment_failed(db, &intent.id, hint, reason).await?;
            WebhookOutcome::Processed
        }
        other => {
            tracing::debug!(event_id = %event.id, event_type = other, "Unhandled webhook type");
            WebhookOutcome::Ignored
        }
    };

    WebhookEvents::update_many()
        .set(webhook_events::ActiveModel {
            processed: Set(true),
            ..Default::default()
        })
        .filter(webhook_events::Column::EventId.eq(event.id.as_str()))
        .exec(db)
        .await?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, ?outcome, "Webhook handled");
    Ok(outcome)
}

async fn apply_completed_session(
    db: &DatabaseConnection,
    config: &AppConfig,
    session: &SessionDetails,
) -> Result<WebhookOutcome, ServiceError> {
    if !session.is_paid() {
        tracing::info!(session_id = %session.id, status = %session.payment_status, "Session completed but not paid");
        return Ok(WebhookOutcome::Ignored);
    }

    let Some(target) = session.target() else {
        tracing::warn!(session_id = %session.id, "Paid session without booking/order metadata");
        return Ok(WebhookOutcome::Ignored);
    };

    match mark_target_paid(db, target, session.payment_intent.clone(), &config.currency).await {
        Ok(_) => Ok(WebhookOutcome::Processed),
        Err(ServiceError::NotFound(msg)) => {
            tracing::warn!(session_id = %session.id, ?target, %msg, "Paid session names no known booking");
            Ok(WebhookOutcome::Ignored)
        }
        Err(e) => Err(e),
    }
}

async fn apply_intent_succeeded(
    db: &DatabaseConnection,
    config: &AppConfig,
    intent: &IntentObject,
) -> Result<WebhookOutcome, ServiceError> {
    let payment = Payments::find()
        .filter(payments::Column::PaymentIntentId.eq(intent.id.as_str()))
        .one(db)
        .await?;

    let target = match payment {
        Some(payment) => Some(PaymentTarget::Booking(payment.booking_id)),
        None => PaymentTarget::from_metadata(&intent.metadata),
    };

    let Some(target) = target else {
        tracing::warn!(payment_intent_id = %intent.id, "Succeeded intent matches no booking");
        return Ok(WebhookOutcome::Ignored);
    };

    match mark_target_paid(db, target, Some(intent.id.clone()), &config.currency).await {
        Ok(_) => {}
        Err(ServiceError::NotFound(msg)) => {
            tracing::warn!(payment_intent_id = %intent.id, ?target, %msg, "Succeeded intent names no known booking");
            return Ok(WebhookOutcome::Ignored);
        }
        Err(e) => return Err(e),
    }

    if let Some(charge_id) = &intent.latest_charge {
        Payments::update_many()
            .set(payments::ActiveModel {
                charge_id: Set(Some(charge_id.clone())),
                ..Default::default()
            })
            .filter(payments::Column::PaymentIntentId.eq(intent.id.as_str()))
            .exec(db)
            .await?;
    }

    Ok(WebhookOutcome::Processed)
}

// ---------------------------------------------------------------------------
// Success page and status poll
// ---------------------------------------------------------------------------

async fn target_owner<C: ConnectionTrait>(db: &C, target: PaymentTarget) -> Result<Option<i32>, ServiceError> {
    Ok(match target {
        PaymentTarget::Booking(id) => Bookings::find_by_id(id).one(db).await?.map(|b| b.user_id),
        PaymentTarget::Order(id) => BookingOrders::find_by_id(id).one(db).await?.map(|o| o.user_id),
    })
}

async fn summary_for(
    db: &DatabaseConnection,
    booking: Option<bookings::Model>,
) -> Result<PaymentSuccessResponse, ServiceError> {
    let payment = match &booking {
        Some(b) => Payments::find()
            .filter(payments::Column::BookingId.eq(b.id))
            .one(db)
            .await?
            .map(PaymentSummary::from),
        None => None,
    };
    Ok(PaymentSuccessResponse {
        booking: booking.map(BookingSummary::from),
        payment,
    })
}

/// Reconcile on the renter's return from hosted checkout.
///
/// Falls back to the viewer's most recently paid booking when the
/// session cannot be used (absent, unpaid, foreign, gateway down).
pub async fn reconcile_success(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    viewer_id: i32,
    session_id: Option<&str>,
) -> Result<PaymentSuccessResponse, ServiceError> {
    if let Some(session_id) = session_id.filter(|s| !s.trim().is_empty()) {
        match gateway.retrieve_session(session_id).await {
            Ok(session) => {
                if let Some(target) = session.target() {
                    if target_owner(db, target).await? == Some(viewer_id) {
                        if session.is_paid() {
                            mark_target_paid(db, target, session.payment_intent.clone(), &config.currency)
                                .await?;
                        }
                        let (_, members) = target_bookings(db, target).await?;
                        let booking = match target {
                            PaymentTarget::Booking(id) => members.into_iter().find(|b| b.id == id),
                            PaymentTarget::Order(_) => members.into_iter().next(),
                        };
                        return summary_for(db, booking).await;
                    }
                    tracing::warn!(session_id, viewer_id, "Success page session belongs to another user");
                }
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "Could not retrieve checkout session");
            }
        }
    }

    let latest_paid = Bookings::find()
        .filter(bookings::Column::UserId.eq(viewer_id))
        .filter(bookings::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .order_by_desc(bookings::Column::UpdatedAt)
        .order_by_desc(bookings::Column::Id)
        .one(db)
        .await?;

    summary_for(db, latest_paid).await
}

fn status_response(booking: &bookings::Model, message: &str) -> PaymentStatusResponse {
    PaymentStatusResponse {
        status: if booking.is_paid() { "success" } else { "pending" }.to_string(),
        payment_status: booking.payment_status.as_str().to_string(),
        message: message.to_string(),
    }
}

/// Poll the gateway for a paid session naming this booking or its order
pub async fn check_payment_status(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &AppConfig,
    viewer_id: i32,
    booking_id: i32,
) -> Result<PaymentStatusResponse, ServiceError> {
    let booking = owned_booking(db, booking_id, viewer_id).await?;
    if booking.is_paid() {
        return Ok(status_response(&booking, "Payment already confirmed"));
    }

    let sessions = gateway
        .list_recent_sessions(RECENT_SESSION_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!(booking_id, error = %e, "Could not list checkout sessions");
            e
        })?;

    let matching = sessions.iter().find(|s| {
        s.is_paid()
            && match s.target() {
                Some(PaymentTarget::Booking(id)) => id == booking.id,
                Some(PaymentTarget::Order(id)) => Some(id) == booking.order_id,
                None => false,
            }
    });

    let Some(session) = matching else {
        return Ok(status_response(&booking, "Payment not confirmed yet"));
    };

    let target = session.target().unwrap_or(PaymentTarget::Booking(booking.id));
    let outcome = mark_target_paid(db, target, session.payment_intent.clone(), &config.currency).await?;

    let refreshed = owned_booking(db, booking_id, viewer_id).await?;
    let message = match outcome {
        MarkPaidOutcome::BedTaken { .. } => {
            "This bed was booked by another renter first; contact support for a refund"
        }
        _ => "Payment confirmed",
    };
    Ok(status_response(&refreshed, message))
}

/// Payment page context for a renter's booking
pub async fn payment_page(
    db: &DatabaseConnection,
    config: &AppConfig,
    viewer_id: i32,
    booking_id: i32,
) -> Result<PaymentPageResponse, ServiceError> {
    let booking = owned_booking(db, booking_id, viewer_id).await?;
    let amount_due = commission_due(db, &booking).await?;

    Ok(PaymentPageResponse {
        manual_payment_url: format!("/payments/manual/{}", booking.id),
        booking: BookingSummary::from(booking),
        amount_due,
        currency: config.currency.clone(),
    })
}

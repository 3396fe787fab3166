use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::manual_payments::{self, ReviewStatus};
use crate::entities::payments::{self, CardPaymentStatus};
use crate::models::booking::BookingSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingIdRequest {
    pub booking_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub session_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    /// "success" once reconciled as paid, otherwise "pending"
    pub status: String,
    pub payment_status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub id: i32,
    pub booking_id: i32,
    pub payment_intent_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: CardPaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<payments::Model> for PaymentSummary {
    fn from(p: payments::Model) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            payment_intent_id: p.payment_intent_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            failure_reason: p.failure_reason,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSuccessResponse {
    pub booking: Option<BookingSummary>,
    pub payment: Option<PaymentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPageResponse {
    pub booking: BookingSummary,
    /// Commission due now; for order members this is the whole order's total
    pub amount_due: Decimal,
    pub currency: String,
    pub manual_payment_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPaymentRequest {
    pub amount: Decimal,
    pub sender_phone: String,
    #[serde(default)]
    pub transaction_ref: Option<String>,
    /// Path of the uploaded proof in the external file store
    pub screenshot_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPaymentSummary {
    pub id: i32,
    pub booking_id: i32,
    pub amount: Decimal,
    pub sender_phone: String,
    pub transaction_ref: Option<String>,
    pub screenshot_path: String,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<manual_payments::Model> for ManualPaymentSummary {
    fn from(m: manual_payments::Model) -> Self {
        Self {
            id: m.id,
            booking_id: m.booking_id,
            amount: m.amount,
            sender_phone: m.sender_phone,
            transaction_ref: m.transaction_ref,
            screenshot_path: m.screenshot_path,
            status: m.status,
            rejection_reason: m.rejection_reason,
            reviewed_at: m.reviewed_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualInstructionsResponse {
    pub booking: BookingSummary,
    pub receiver_number: String,
    pub amount_due: Decimal,
    pub manual_payment: Option<ManualPaymentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub reviewer: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Acknowledgement returned to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub duplicate: bool,
}

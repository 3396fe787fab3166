use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::booking_orders::PaymentMethod;
use crate::entities::bookings::{self, BookingStatus, PaymentStatus};

/// Single-bed reservation form. Dates arrive as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveBedRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiBookingRequest {
    pub bed_ids: Vec<i32>,
    pub start_date: String,
    pub end_date: String,
    pub payment_method: PaymentMethod,
}

/// Exactly one of `session_url` / `manual_url` is set, matching the payment method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiBookingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_url: Option<String>,
    pub order_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSummary {
    pub id: i32,
    pub bed_id: i32,
    pub order_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_price: Decimal,
    pub total_amount: Decimal,
    pub commission_amount: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl From<bookings::Model> for BookingSummary {
    fn from(b: bookings::Model) -> Self {
        Self {
            id: b.id,
            bed_id: b.bed_id,
            order_id: b.order_id,
            start_date: b.start_date,
            end_date: b.end_date,
            monthly_price: b.monthly_price,
            total_amount: b.total_amount,
            commission_amount: b.commission_amount,
            status: b.status,
            payment_status: b.payment_status,
            notes: b.notes,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveBedResponse {
    pub booking: BookingSummary,
    pub notice: String,
    /// Where the renter continues to pay the commission
    pub payment_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyBookingsResponse {
    pub bookings: Vec<BookingSummary>,
}

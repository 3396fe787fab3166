//! Booking engine: stay validation, single and multi-bed reservation,
//! cancellation and the renter's read views.
//!
//! Reservation never touches the bed's cached status; beds flip to
//! `booked` only when a booking is marked paid (see `reconciliation`).

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashSet;

use crate::entities::beds::BedStatus;
use crate::entities::booking_orders::{self, OrderStatus, PaymentMethod};
use crate::entities::bookings::{self, BookingStatus, PaymentStatus};
use crate::entities::prelude::*;
use crate::error::ServiceError;
use crate::services::inventory::{self, BedListing};

pub const MIN_STAY_DAYS: i64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A validated `[start, end)` stay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stay {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Stay {
    pub fn parse(start: &str, end: &str, today: NaiveDate) -> Result<Self, ServiceError> {
        let start = parse_date("start date", start)?;
        let end = parse_date("end date", end)?;
        validate_stay(start, end, today)?;
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        ServiceError::Validation(format!("Invalid {}: expected YYYY-MM-DD, got '{}'", field, raw))
    })
}

pub fn validate_stay(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::Validation(
            "End date must be after the start date".to_string(),
        ));
    }
    if start < today {
        return Err(ServiceError::Validation(
            "Start date cannot be in the past".to_string(),
        ));
    }
    if (end - start).num_days() < MIN_STAY_DAYS {
        return Err(ServiceError::Validation(format!(
            "Minimum stay is {} days",
            MIN_STAY_DAYS
        )));
    }
    Ok(())
}

/// A confirmed, paid booking on the bed overlapping `[start, end)`, other than `exclude`
async fn paid_overlap<C: ConnectionTrait>(
    db: &C,
    bed_id: i32,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<i32>,
) -> Result<Option<bookings::Model>, ServiceError> {
    let mut query = Bookings::find()
        .filter(bookings::Column::BedId.eq(bed_id))
        .filter(bookings::Column::Status.eq(BookingStatus::Confirmed))
        .filter(bookings::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .filter(bookings::Column::StartDate.lt(end))
        .filter(bookings::Column::EndDate.gt(start));
    if let Some(id) = exclude {
        query = query.filter(bookings::Column::Id.ne(id));
    }
    Ok(query.one(db).await?)
}

/// Reject when a confirmed, paid booking on the bed overlaps the stay
async fn ensure_no_overlap<C: ConnectionTrait>(
    db: &C,
    listing: &BedListing,
    stay: Stay,
) -> Result<(), ServiceError> {
    let clash = paid_overlap(db, listing.bed.id, stay.start, stay.end, None).await?;

    if let Some(existing) = clash {
        tracing::debug!(
            bed_id = listing.bed.id,
            existing_booking_id = existing.id,
            "Requested stay overlaps a paid booking"
        );
        return Err(ServiceError::Validation(format!(
            "Bed {} is already booked for the selected dates",
            listing.bed.bed_number
        )));
    }
    Ok(())
}

/// Another renter's paid booking holding this booking's bed for overlapping dates
pub async fn competing_paid_booking<C: ConnectionTrait>(
    db: &C,
    booking: &bookings::Model,
) -> Result<Option<bookings::Model>, ServiceError> {
    paid_overlap(db, booking.bed_id, booking.start_date, booking.end_date, Some(booking.id)).await
}

/// Refuse to take payment for a booking whose bed was already won by someone else
pub async fn ensure_bed_still_free<C: ConnectionTrait>(
    db: &C,
    booking: &bookings::Model,
) -> Result<(), ServiceError> {
    if let Some(holder) = competing_paid_booking(db, booking).await? {
        tracing::info!(
            booking_id = booking.id,
            bed_id = booking.bed_id,
            holder_booking_id = holder.id,
            "Payment refused, bed already booked for these dates"
        );
        return Err(ServiceError::Validation(
            "This bed has already been booked by another renter for these dates".to_string(),
        ));
    }
    Ok(())
}

fn ensure_bookable(listing: &BedListing) -> Result<(), ServiceError> {
    if !listing.is_bookable() {
        return Err(ServiceError::Validation(format!(
            "Bed {} is not available for booking",
            listing.bed.bed_number
        )));
    }
    Ok(())
}

fn new_booking(
    renter_id: i32,
    listing: &BedListing,
    stay: Stay,
    order_id: Option<i32>,
    commission: Decimal,
    notes: String,
) -> bookings::ActiveModel {
    let now = Utc::now();
    bookings::ActiveModel {
        user_id: Set(renter_id),
        bed_id: Set(listing.bed.id),
        order_id: Set(order_id),
        start_date: Set(stay.start),
        end_date: Set(stay.end),
        monthly_price: Set(listing.bed.monthly_price),
        // single-month charge model
        total_amount: Set(listing.bed.monthly_price),
        commission_amount: Set(commission),
        status: Set(BookingStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        notes: Set(notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Reserve one bed for a renter. The booking starts pending/pending.
pub async fn reserve_bed(
    db: &DatabaseConnection,
    renter_id: i32,
    bed_id: i32,
    stay: Stay,
    notes: Option<String>,
    default_commission: Decimal,
) -> Result<bookings::Model, ServiceError> {
    let txn = db.begin().await?;

    let listing = inventory::get_bed(&txn, bed_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Bed {} not found", bed_id)))?;

    ensure_bookable(&listing)?;
    ensure_no_overlap(&txn, &listing, stay).await?;

    let commission = listing.bed.commission_amount.unwrap_or(default_commission);
    let notes = notes.map(|n| n.trim().to_string()).unwrap_or_default();

    let booking = new_booking(renter_id, &listing, stay, None, commission, notes)
        .insert(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = booking.id,
        bed_id,
        renter_id,
        total = %booking.total_amount,
        "Booking reserved"
    );
    Ok(booking)
}

#[derive(Debug, Clone)]
pub struct MultiReservation {
    pub order: booking_orders::Model,
    pub bookings: Vec<bookings::Model>,
}

impl MultiReservation {
    /// Booking used as the order's handle in payment URLs
    pub fn lead_booking_id(&self) -> Option<i32> {
        self.bookings.first().map(|b| b.id)
    }
}

/// Reserve several beds of one apartment as a single order.
///
/// All-or-nothing: any missing, unavailable or foreign bed rejects the
/// whole request and nothing is written.
pub async fn reserve_beds(
    db: &DatabaseConnection,
    renter_id: i32,
    bed_ids: &[i32],
    stay: Stay,
    payment_method: PaymentMethod,
    default_commission: Decimal,
) -> Result<MultiReservation, ServiceError> {
    let mut seen = HashSet::new();
    let bed_ids: Vec<i32> = bed_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    if bed_ids.is_empty() {
        return Err(ServiceError::Validation(
            "Select at least one bed".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let mut listings = Vec::with_capacity(bed_ids.len());
    for bed_id in &bed_ids {
        let listing = inventory::get_bed(&txn, *bed_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bed {} not found", bed_id)))?;
        listings.push(listing);
    }

    let apartment_id = listings[0].apartment_id;
    if listings.iter().any(|l| l.apartment_id != apartment_id) {
        return Err(ServiceError::Validation(
            "All selected beds must belong to the same apartment".to_string(),
        ));
    }

    for listing in &listings {
        ensure_bookable(listing)?;
        ensure_no_overlap(&txn, listing, stay).await?;
    }

    let commissions: Vec<Decimal> = listings
        .iter()
        .map(|l| l.bed.commission_amount.unwrap_or(default_commission))
        .collect();
    let total_commission: Decimal = commissions.iter().copied().sum();

    let now = Utc::now();
    let order = booking_orders::ActiveModel {
        user_id: Set(renter_id),
        total_commission: Set(total_commission),
        payment_method: Set(payment_method),
        status: Set(OrderStatus::Pending),
        checkout_session_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut bookings = Vec::with_capacity(listings.len());
    for (listing, commission) in listings.iter().zip(commissions) {
        let booking = new_booking(renter_id, listing, stay, Some(order.id), commission, String::new())
            .insert(&txn)
            .await?;
        bookings.push(booking);
    }

    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        renter_id,
        beds = bookings.len(),
        total_commission = %order.total_commission,
        method = ?payment_method,
        "Multi-bed order reserved"
    );

    Ok(MultiReservation { order, bookings })
}

/// Cancel a renter's booking and release the bed if nothing else holds it
pub async fn cancel_booking(
    db: &DatabaseConnection,
    renter_id: i32,
    booking_id: i32,
    today: NaiveDate,
) -> Result<bookings::Model, ServiceError> {
    let txn = db.begin().await?;

    let booking = Bookings::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

    if booking.user_id != renter_id {
        return Err(ServiceError::Forbidden(
            "You can only cancel your own bookings".to_string(),
        ));
    }

    match booking.status {
        BookingStatus::Cancelled => {
            tracing::debug!(booking_id, "Booking already cancelled");
            return Ok(booking);
        }
        BookingStatus::Completed => {
            return Err(ServiceError::Validation(
                "Completed bookings cannot be cancelled".to_string(),
            ));
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }

    let bed_id = booking.bed_id;
    let mut active = booking.into_active_model();
    active.status = Set(BookingStatus::Cancelled);
    active.updated_at = Set(Utc::now());
    let cancelled = active.update(&txn).await?;

    let still_held = Bookings::find()
        .filter(bookings::Column::BedId.eq(bed_id))
        .filter(bookings::Column::Id.ne(booking_id))
        .filter(bookings::Column::Status.eq(BookingStatus::Confirmed))
        .filter(bookings::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .filter(bookings::Column::EndDate.gte(today))
        .count(&txn)
        .await?;

    if still_held == 0 {
        if let Some(listing) = inventory::get_bed(&txn, bed_id).await? {
            if listing.bed.status == BedStatus::Booked {
                inventory::set_bed_status(&txn, bed_id, BedStatus::Available).await?;
            }
        }
    }

    txn.commit().await?;

    tracing::info!(booking_id, bed_id, bed_released = still_held == 0, "Booking cancelled");
    Ok(cancelled)
}

pub async fn my_bookings(
    db: &DatabaseConnection,
    renter_id: i32,
) -> Result<Vec<bookings::Model>, ServiceError> {
    Ok(Bookings::find()
        .filter(bookings::Column::UserId.eq(renter_id))
        .order_by_desc(bookings::Column::CreatedAt)
        .order_by_desc(bookings::Column::Id)
        .all(db)
        .await?)
}

/// Load a booking and make sure `renter_id` owns it
pub async fn owned_booking<C: ConnectionTrait>(
    db: &C,
    booking_id: i32,
    renter_id: i32,
) -> Result<bookings::Model, ServiceError> {
    let booking = Bookings::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

    if booking.user_id != renter_id {
        return Err(ServiceError::Forbidden(
            "This booking belongs to another user".to_string(),
        ));
    }
    Ok(booking)
}

/// Commission owed for a booking; order members owe the whole order's total
pub async fn commission_due<C: ConnectionTrait>(
    db: &C,
    booking: &bookings::Model,
) -> Result<Decimal, ServiceError> {
    if let Some(order_id) = booking.order_id {
        if let Some(order) = BookingOrders::find_by_id(order_id).one(db).await? {
            return Ok(order.total_commission);
        }
    }
    Ok(booking.commission_amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_valid_stay() {
        let stay = Stay::parse("2025-03-01", "2025-04-15", d("2025-02-01")).unwrap();
        assert_eq!(stay.days(), 45);
    }

    #[test]
    fn test_end_must_follow_start() {
        let err = validate_stay(d("2025-03-01"), d("2025-03-01"), d("2025-02-01")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = validate_stay(d("2025-04-01"), d("2025-03-01"), d("2025-02-01")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_start_in_past_rejected() {
        let err = validate_stay(d("2025-01-01"), d("2025-03-01"), d("2025-02-01")).unwrap_err();
        assert!(err.to_string().contains("past"));
    }

    #[test]
    fn test_start_today_allowed() {
        assert!(validate_stay(d("2025-02-01"), d("2025-03-03"), d("2025-02-01")).is_ok());
    }

    #[test]
    fn test_minimum_stay_boundary() {
        // 29 nights
        assert!(validate_stay(d("2025-03-01"), d("2025-03-30"), d("2025-02-01")).is_err());
        // exactly 30
        assert!(validate_stay(d("2025-03-01"), d("2025-03-31"), d("2025-02-01")).is_ok());
    }

    #[test]
    fn test_malformed_date_string() {
        let err = Stay::parse("01/03/2025", "2025-04-15", d("2025-02-01")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(err.to_string().contains("start date"));
    }
}

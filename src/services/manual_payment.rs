//! Manual (mobile-money) commission payments
//!
//! The renter transfers the commission to the platform wallet and uploads
//! proof; a reviewer approves or rejects it. Approval is the only manual
//! trigger of the paid transition.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};

use crate::config::AppConfig;
use crate::entities::manual_payments::{self, ReviewStatus};
use crate::entities::prelude::*;
use crate::error::ServiceError;
use crate::models::booking::BookingSummary;
use crate::models::payment::{ManualInstructionsResponse, ManualPaymentRequest, ManualPaymentSummary};
use crate::services::booking::{commission_due, owned_booking};
use crate::services::gateway::PaymentTarget;
use crate::services::reconciliation::{self, settleable_members, MarkPaidOutcome};

const PHONE_PREFIX: &str = "01";
const PHONE_MIN_LEN: usize = 10;
const PHONE_MAX_LEN: usize = 14;

/// Local mobile number: digits only, `01` prefix, 10 to 14 digits
pub fn validate_sender_phone(raw: &str) -> Result<String, ServiceError> {
    let phone = raw.trim();
    if phone.is_empty() {
        return Err(ServiceError::Validation("Sender phone number is required".to_string()));
    }
    if !phone.starts_with(PHONE_PREFIX) || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::Validation(
            "Enter a valid mobile number starting with 01".to_string(),
        ));
    }
    if phone.len() < PHONE_MIN_LEN || phone.len() > PHONE_MAX_LEN {
        return Err(ServiceError::Validation("Phone number length is invalid".to_string()));
    }
    Ok(phone.to_string())
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Submitted(manual_payments::Model),
    /// A reviewer already approved an earlier proof; nothing changed
    AlreadyApproved(manual_payments::Model),
    /// Commission settled some other way (card); nothing changed
    AlreadyPaid,
}

async fn current_proof(
    db: &DatabaseConnection,
    booking_id: i32,
) -> Result<Option<manual_payments::Model>, ServiceError> {
    Ok(ManualPayments::find()
        .filter(manual_payments::Column::BookingId.eq(booking_id))
        .one(db)
        .await?)
}

pub async fn instructions(
    db: &DatabaseConnection,
    config: &AppConfig,
    renter_id: i32,
    booking_id: i32,
) -> Result<ManualInstructionsResponse, ServiceError> {
    let booking = owned_booking(db, booking_id, renter_id).await?;
    let amount_due = commission_due(db, &booking).await?;
    let manual_payment = current_proof(db, booking.id).await?.map(ManualPaymentSummary::from);

    Ok(ManualInstructionsResponse {
        booking: BookingSummary::from(booking),
        receiver_number: config.manual_payment_receiver.clone(),
        amount_due,
        manual_payment,
    })
}

/// Submit or replace the proof for a booking. No history is kept.
pub async fn submit_proof(
    db: &DatabaseConnection,
    renter_id: i32,
    booking_id: i32,
    request: ManualPaymentRequest,
) -> Result<SubmitOutcome, ServiceError> {
    let booking = owned_booking(db, booking_id, renter_id).await?;

    if let Some(existing) = current_proof(db, booking.id).await? {
        if existing.status == ReviewStatus::Approved {
            tracing::info!(booking_id, "Manual payment already approved, resubmission ignored");
            return Ok(SubmitOutcome::AlreadyApproved(existing));
        }
    }
    if booking.is_paid() {
        return Ok(SubmitOutcome::AlreadyPaid);
    }
    settleable_members(db, &booking).await?;

    let sender_phone = validate_sender_phone(&request.sender_phone)?;
    if request.amount <= Decimal::ZERO {
        return Err(ServiceError::Validation("Amount must be greater than zero".to_string()));
    }
    let screenshot_path = request.screenshot_path.trim();
    if screenshot_path.is_empty() {
        return Err(ServiceError::Validation("Payment screenshot is required".to_string()));
    }
    let transaction_ref = request
        .transaction_ref
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let txn = db.begin().await?;

    ManualPayments::delete_many()
        .filter(manual_payments::Column::BookingId.eq(booking.id))
        .exec(&txn)
        .await?;

    let proof = manual_payments::ActiveModel {
        booking_id: Set(booking.id),
        amount: Set(request.amount),
        sender_phone: Set(sender_phone),
        transaction_ref: Set(transaction_ref),
        screenshot_path: Set(screenshot_path.to_string()),
        status: Set(ReviewStatus::Pending),
        reviewed_by: Set(None),
        rejection_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(booking_id, manual_payment_id = proof.id, amount = %proof.amount, "Manual payment proof submitted");
    Ok(SubmitOutcome::Submitted(proof))
}

/// Approve a proof and mark its booking (or whole order) paid in one transaction
pub async fn approve(
    db: &DatabaseConnection,
    config: &AppConfig,
    manual_payment_id: i32,
    reviewer: &str,
) -> Result<(manual_payments::Model, MarkPaidOutcome), ServiceError> {
    let txn = db.begin().await?;

    let proof = ManualPayments::find_by_id(manual_payment_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Manual payment {} not found", manual_payment_id)))?;

    if proof.status == ReviewStatus::Approved {
        txn.commit().await?;
        tracing::info!(manual_payment_id, "Manual payment already approved");
        return Ok((proof, MarkPaidOutcome::AlreadyPaid));
    }

    let booking_id = proof.booking_id;
    let mut active = proof.into_active_model();
    active.status = Set(ReviewStatus::Approved);
    active.reviewed_by = Set(Some(reviewer.to_string()));
    active.rejection_reason = Set(None);
    active.reviewed_at = Set(Some(Utc::now()));
    let approved = active.update(&txn).await?;

    let outcome =
        reconciliation::apply_paid(&txn, PaymentTarget::Booking(booking_id), None, &config.currency).await?;

    if let MarkPaidOutcome::BedTaken { booking_id: lost } = outcome {
        // proof stays pending so the reviewer can reject it
        txn.rollback().await?;
        tracing::warn!(manual_payment_id, booking_id, lost_booking_id = lost, "Approval refused, bed already won");
        return Err(ServiceError::Validation(
            "The bed has already been booked by another renter for these dates".to_string(),
        ));
    }

    txn.commit().await?;

    tracing::info!(manual_payment_id, booking_id, reviewer, ?outcome, "Manual payment approved");
    Ok((approved, outcome))
}

/// Reject a proof. The booking is untouched and the renter may resubmit.
pub async fn reject(
    db: &DatabaseConnection,
    manual_payment_id: i32,
    reviewer: &str,
    reason: Option<String>,
) -> Result<manual_payments::Model, ServiceError> {
    let proof = ManualPayments::find_by_id(manual_payment_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Manual payment {} not found", manual_payment_id)))?;

    if proof.status == ReviewStatus::Approved {
        return Err(ServiceError::Validation(
            "An approved payment cannot be rejected".to_string(),
        ));
    }

    let booking_id = proof.booking_id;
    let mut active = proof.into_active_model();
    active.status = Set(ReviewStatus::Rejected);
    active.reviewed_by = Set(Some(reviewer.to_string()));
    active.rejection_reason = Set(reason);
    active.reviewed_at = Set(Some(Utc::now()));
    let rejected = active.update(db).await?;

    tracing::info!(manual_payment_id, booking_id, reviewer, "Manual payment rejected");
    Ok(rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_phones() {
        assert_eq!(validate_sender_phone("01012345678").unwrap(), "01012345678");
        assert_eq!(validate_sender_phone(" 0101234567 ").unwrap(), "0101234567");
        assert!(validate_sender_phone("01234567890123").is_ok());
    }

    #[test]
    fn test_phone_must_start_with_01() {
        assert!(validate_sender_phone("02012345678").is_err());
        assert!(validate_sender_phone("+201012345678").is_err());
    }

    #[test]
    fn test_phone_digits_only() {
        assert!(validate_sender_phone("010-1234-5678").is_err());
    }

    #[test]
    fn test_phone_length_bounds() {
        assert!(validate_sender_phone("010123456").is_err());
        assert!(validate_sender_phone("010123456789012").is_err());
    }

    #[test]
    fn test_phone_required() {
        assert!(validate_sender_phone("   ").is_err());
    }
}

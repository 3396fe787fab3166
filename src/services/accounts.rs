//! Account kinds and seller onboarding
//!
//! A seller carries its onboarding state (contract + document
//! verification) as part of the account value, so the request gate and
//! the seller pages never have to look it up separately.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Set, TransactionTrait,
};

use crate::entities::seller_verifications::{self, VerificationStatus};
use crate::entities::users::{self, UserRole};
use crate::entities::prelude::*;
use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    NotSubmitted,
    Pending,
    Approved,
    Rejected(Option<String>),
}

impl VerificationState {
    fn from_record(record: Option<&seller_verifications::Model>) -> Self {
        match record {
            None => VerificationState::NotSubmitted,
            Some(v) => match v.status {
                VerificationStatus::Pending => VerificationState::Pending,
                VerificationStatus::Approved => VerificationState::Approved,
                VerificationStatus::Rejected => {
                    VerificationState::Rejected(v.rejection_reason.clone())
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerProfile {
    pub contract_accepted_at: Option<DateTime<Utc>>,
    pub contract_accepted_ip: Option<String>,
    pub contract_accepted: bool,
    pub verification: VerificationState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKind {
    Buyer,
    Seller(SellerProfile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user: users::Model,
    pub kind: AccountKind,
}

impl Account {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn seller_profile(&self) -> Option<&SellerProfile> {
        match &self.kind {
            AccountKind::Seller(profile) => Some(profile),
            AccountKind::Buyer => None,
        }
    }

    fn require_seller(&self) -> Result<&SellerProfile, ServiceError> {
        self.seller_profile()
            .ok_or_else(|| ServiceError::Forbidden("This page is for property owners only".to_string()))
    }
}

/// Resolve a user id into a typed account; `None` for unknown ids
pub async fn load_account<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<Account>, sea_orm::DbErr> {
    let Some(user) = Users::find_by_id(user_id).one(db).await? else {
        return Ok(None);
    };

    let kind = match user.role {
        UserRole::Buyer => AccountKind::Buyer,
        UserRole::Seller => {
            let verification = SellerVerifications::find()
                .filter(seller_verifications::Column::SellerId.eq(user.id))
                .one(db)
                .await?;

            AccountKind::Seller(SellerProfile {
                contract_accepted: user.contract_accepted,
                contract_accepted_at: user.contract_accepted_at,
                contract_accepted_ip: user.contract_accepted_ip.clone(),
                verification: VerificationState::from_record(verification.as_ref()),
            })
        }
    };

    Ok(Some(Account { user, kind }))
}

/// Record contract acceptance. Accepting twice keeps the first timestamp.
pub async fn accept_contract(
    db: &DatabaseConnection,
    account: &Account,
    ip: Option<String>,
) -> Result<users::Model, ServiceError> {
    let profile = account.require_seller()?;

    if profile.contract_accepted {
        tracing::debug!(user_id = account.id(), "Contract already accepted");
        return Ok(account.user.clone());
    }

    let mut active = account.user.clone().into_active_model();
    active.contract_accepted = Set(true);
    active.contract_accepted_at = Set(Some(Utc::now()));
    active.contract_accepted_ip = Set(ip);
    let updated = active.update(db).await?;

    tracing::info!(user_id = updated.id, "Seller accepted contract");
    Ok(updated)
}

pub async fn verification_for(
    db: &DatabaseConnection,
    seller_id: i32,
) -> Result<Option<seller_verifications::Model>, ServiceError> {
    Ok(SellerVerifications::find()
        .filter(seller_verifications::Column::SellerId.eq(seller_id))
        .one(db)
        .await?)
}

/// Create or replace the seller's verification documents; always lands in `pending`
pub async fn submit_verification(
    db: &DatabaseConnection,
    account: &Account,
    id_document_path: &str,
    ownership_document_path: &str,
) -> Result<seller_verifications::Model, ServiceError> {
    account.require_seller()?;

    let id_document_path = id_document_path.trim();
    let ownership_document_path = ownership_document_path.trim();
    if id_document_path.is_empty() || ownership_document_path.is_empty() {
        return Err(ServiceError::Validation(
            "Both the ID document and the ownership document are required".to_string(),
        ));
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let existing = SellerVerifications::find()
        .filter(seller_verifications::Column::SellerId.eq(account.id()))
        .one(&txn)
        .await?;

    let record = match existing {
        Some(existing) => {
            let mut active = existing.into_active_model();
            active.id_document_path = Set(id_document_path.to_string());
            active.ownership_document_path = Set(ownership_document_path.to_string());
            active.status = Set(VerificationStatus::Pending);
            active.rejection_reason = Set(None);
            active.submitted_at = Set(now);
            active.reviewed_at = Set(None);
            active.update(&txn).await?
        }
        None => {
            seller_verifications::ActiveModel {
                seller_id: Set(account.id()),
                id_document_path: Set(id_document_path.to_string()),
                ownership_document_path: Set(ownership_document_path.to_string()),
                status: Set(VerificationStatus::Pending),
                rejection_reason: Set(None),
                submitted_at: Set(now),
                reviewed_at: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    if account.user.is_verified {
        let mut user = account.user.clone().into_active_model();
        user.is_verified = Set(false);
        user.update(&txn).await?;
    }

    txn.commit().await?;

    tracing::info!(user_id = account.id(), verification_id = record.id, "Verification submitted");
    Ok(record)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationDecision {
    Approve,
    Reject(Option<String>),
}

/// Reviewer action; `users.is_verified` follows the outcome
pub async fn review_verification(
    db: &DatabaseConnection,
    verification_id: i32,
    decision: VerificationDecision,
) -> Result<seller_verifications::Model, ServiceError> {
    let txn = db.begin().await?;

    let record = SellerVerifications::find_by_id(verification_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Verification {} not found", verification_id)))?;
    let seller_id = record.seller_id;

    let (status, reason, verified) = match decision {
        VerificationDecision::Approve => (VerificationStatus::Approved, None, true),
        VerificationDecision::Reject(reason) => (VerificationStatus::Rejected, reason, false),
    };

    let mut active = record.into_active_model();
    active.status = Set(status);
    active.rejection_reason = Set(reason);
    active.reviewed_at = Set(Some(Utc::now()));
    let updated = active.update(&txn).await?;

    Users::update_many()
        .col_expr(users::Column::IsVerified, sea_orm::sea_query::Expr::value(verified))
        .filter(users::Column::Id.eq(seller_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        verification_id,
        seller_id,
        status = ?updated.status,
        "Verification reviewed"
    );
    Ok(updated)
}

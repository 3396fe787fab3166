use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::seller_verifications::{self, VerificationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitVerificationRequest {
    pub id_document_path: String,
    pub ownership_document_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationView {
    pub id: i32,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<seller_verifications::Model> for VerificationView {
    fn from(v: seller_verifications::Model) -> Self {
        Self {
            id: v.id,
            status: v.status,
            rejection_reason: v.rejection_reason,
            submitted_at: v.submitted_at,
            reviewed_at: v.reviewed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStatusResponse {
    pub verification: Option<VerificationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractResponse {
    pub accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub contract_text: String,
}

//! Request-time onboarding gate for seller accounts
//!
//! Sellers must accept the contract, then submit verification documents,
//! then be approved, before anything else is reachable. The check is a
//! pure function of the account and the request path.

use super::accounts::{Account, AccountKind, VerificationState};

pub const CONTRACT_PATH: &str = "/accounts/seller/contract";
pub const VERIFICATION_PATH: &str = "/accounts/seller/verification";
pub const PENDING_PATH: &str = "/accounts/seller/pending";
pub const LOGOUT_PATH: &str = "/accounts/logout";

const ADMIN_PREFIX: &str = "/admin";

const ALLOWED_PATHS: [&str; 4] = [CONTRACT_PATH, VERIFICATION_PATH, PENDING_PATH, LOGOUT_PATH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect {
        target: &'static str,
        notice: &'static str,
    },
}

fn is_exempt(path: &str) -> bool {
    let path = match path.len() {
        1 => path,
        _ => path.trim_end_matches('/'),
    };

    if path == ADMIN_PREFIX || path.starts_with("/admin/") {
        return true;
    }

    ALLOWED_PATHS.contains(&path)
}

pub fn evaluate(account: Option<&Account>, path: &str) -> GateDecision {
    let Some(Account {
        kind: AccountKind::Seller(profile),
        ..
    }) = account
    else {
        return GateDecision::Pass;
    };

    if is_exempt(path) {
        return GateDecision::Pass;
    }

    if !profile.contract_accepted {
        return GateDecision::Redirect {
            target: CONTRACT_PATH,
            notice: "Please accept the owner contract to continue",
        };
    }

    match profile.verification {
        VerificationState::NotSubmitted => GateDecision::Redirect {
            target: VERIFICATION_PATH,
            notice: "Please upload your verification documents",
        },
        VerificationState::Approved => GateDecision::Pass,
        VerificationState::Pending | VerificationState::Rejected(_) => GateDecision::Redirect {
            target: PENDING_PATH,
            notice: "Your account is awaiting verification review",
        },
    }
}

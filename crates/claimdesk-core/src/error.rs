use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActiveClaim, Category, ClaimStatus};

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error(
        "insufficient {category} credit balance: requested {requested}, current balance is {balance}"
    )]
    InsufficientBalance {
        category: Category,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("receipt '{file_name}' is {existing}; contact HR if you did not submit it")]
    DuplicateImage {
        file_name: String,
        existing: ActiveClaim,
    },

    #[error("invalid image '{file_name}': {reason}")]
    InvalidImage { file_name: String, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("claim {claim_id} is {status}, only Pending claims can be changed")]
    NotPending { claim_id: Uuid, status: ClaimStatus },

    #[error("invalid claim category '{0}'")]
    InvalidCategory(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClaimError {
    pub fn claim_not_found(claim_id: Uuid) -> Self {
        ClaimError::NotFound(format!("claim {claim_id}"))
    }

    pub fn account_not_found(employee_id: Uuid, category: Category) -> Self {
        ClaimError::NotFound(format!("{category} credit account for employee {employee_id}"))
    }
}

pub fn storage_error<E: std::fmt::Display>(err: E) -> ClaimError {
    ClaimError::Storage(err.to_string())
}

pub mod error;
pub mod models;
pub mod storage;

pub use error::{ClaimError, storage_error};
pub use models::{
    ActiveClaim, ApprovedClaim, ApprovedReport, ApprovedTotals, Category, Claim, ClaimApproval,
    ClaimDetails, ClaimImage, ClaimStatus, CreditAccount, CreditSummary, Decision,
    DuplicateStatus, EmployeeMonthlyTotals, NewClaim, PerceptualHash, ReceiptUpload,
};
pub use storage::{ApprovedQuery, ClaimFilter, ClaimStore, ClaimTx, ReceiptStorage};

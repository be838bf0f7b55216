use chrono::NaiveDate;
use claimdesk_core::{
    Category, Claim, ClaimApproval, ClaimDetails, ClaimImage, ClaimStatus, EmployeeMonthlyTotals,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitClaimResponse {
    pub claim_id: Uuid,
    pub status: ClaimStatus,
    pub request_date: NaiveDate,
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditClaimRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideClaimRequest {
    pub decision: String,
    pub admin_id: Uuid,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountsRequest {
    pub fuel_limit: Decimal,
    pub opd_limit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCreditAccountRequest {
    pub limit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListClaimsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedTotalsQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedReportQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyBreakdownQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyBreakdownResponse {
    pub year: i32,
    pub month: u32,
    pub employees: Vec<EmployeeMonthlyTotals>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimView {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub category: Category,
    pub amount: Decimal,
    pub status: ClaimStatus,
    pub request_date: NaiveDate,
    pub message: String,
    pub images: Vec<ReceiptView>,
    pub approval: Option<ClaimApproval>,
}

impl From<ClaimDetails> for ClaimView {
    fn from(details: ClaimDetails) -> Self {
        let ClaimDetails {
            claim,
            images,
            approval,
        } = details;

        Self {
            id: claim.id,
            employee_id: claim.employee_id,
            category: claim.category,
            amount: claim.amount,
            status: claim.status,
            request_date: claim.request_date,
            message: claim.message,
            images: images.iter().map(ReceiptView::from_image).collect(),
            approval,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptView {
    pub image_id: Uuid,
    pub url: String,
    pub hash: String,
}

impl ReceiptView {
    pub fn from_image(image: &ClaimImage) -> Self {
        Self {
            image_id: image.id,
            url: format!("/receipts/{}", image.storage_path),
            hash: image.hash.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListClaimsResponse {
    pub claims: Vec<Claim>,
}

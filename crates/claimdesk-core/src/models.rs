use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClaimError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Fuel,
    #[serde(rename = "OPD")]
    Opd,
    Stationary,
}

impl Category {
    pub const METERED: [Category; 2] = [Category::Fuel, Category::Opd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fuel => "Fuel",
            Category::Opd => "OPD",
            Category::Stationary => "Stationary",
        }
    }

    /// Metered categories draw on a per-employee credit account.
    pub fn is_metered(&self) -> bool {
        matches!(self, Category::Fuel | Category::Opd)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClaimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FUEL" => Ok(Category::Fuel),
            "OPD" => Ok(Category::Opd),
            "STATIONARY" => Ok(Category::Stationary),
            _ => Err(ClaimError::InvalidCategory(value.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Approved => "Approved",
            ClaimStatus::Rejected => "Rejected",
        }
    }

    /// Pending and Approved claims hold their amount against the balance.
    pub fn locks_balance(&self) -> bool {
        matches!(self, ClaimStatus::Pending | ClaimStatus::Approved)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ClaimStatus::Pending),
            "APPROVED" => Ok(ClaimStatus::Approved),
            "REJECTED" => Ok(ClaimStatus::Rejected),
            _ => Err(ClaimError::Validation(format!(
                "status must be Pending, Approved, or Rejected, found '{}'",
                value.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> ClaimStatus {
        match self {
            Decision::Approved => ClaimStatus::Approved,
            Decision::Rejected => ClaimStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ClaimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(Decision::Approved),
            "REJECTED" => Ok(Decision::Rejected),
            _ => Err(ClaimError::Validation(
                "decision must be Approved or Rejected".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditAccount {
    pub employee_id: Uuid,
    pub category: Category,
    pub limit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub category: Category,
    pub amount: Decimal,
    pub status: ClaimStatus,
    pub request_date: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimImage {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub storage_path: String,
    pub hash: PerceptualHash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimApproval {
    pub claim_id: Uuid,
    pub admin_id: Uuid,
    pub approval_date: NaiveDate,
    pub admin_message: String,
}

/// 64-bit DCT perceptual hash, rendered as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PerceptualHash {
    type Err = ClaimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() != 16 {
            return Err(ClaimError::Validation(format!(
                "perceptual hash must be 16 hex digits, found '{value}'"
            )));
        }
        u64::from_str_radix(value, 16)
            .map(Self)
            .map_err(|err| ClaimError::Validation(format!("invalid perceptual hash: {err}")))
    }
}

impl From<PerceptualHash> for String {
    fn from(hash: PerceptualHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = ClaimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An existing claim that still holds a receipt fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActiveClaim {
    Pending { claim_id: Uuid },
    Approved { claim_id: Uuid, approved_on: NaiveDate },
}

impl ActiveClaim {
    pub fn claim_id(&self) -> Uuid {
        match self {
            ActiveClaim::Pending { claim_id } | ActiveClaim::Approved { claim_id, .. } => *claim_id,
        }
    }
}

impl fmt::Display for ActiveClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveClaim::Pending { .. } => f.write_str("already marked as Pending"),
            ActiveClaim::Approved { approved_on, .. } => {
                write!(f, "already approved on {}", approved_on.format("%d %B %Y"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateStatus {
    Clear,
    Active(ActiveClaim),
}

/// A receipt file as received from the upload form.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ReceiptUpload {
    pub const ALLOWED_EXTENSIONS: [&'static str; 3] = ["png", "jpg", "jpeg"];

    /// Lowercased extension if it is one of the accepted receipt formats.
    pub fn extension(&self) -> Option<String> {
        let (_, extension) = self.file_name.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();
        Self::ALLOWED_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }
}

#[derive(Debug, Clone)]
pub struct NewClaim {
    pub employee_id: Uuid,
    pub category: Category,
    pub amount: Decimal,
    pub message: String,
    pub images: Vec<ReceiptUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDetails {
    pub claim: Claim,
    pub images: Vec<ClaimImage>,
    pub approval: Option<ClaimApproval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditSummary {
    pub employee_id: Uuid,
    pub fuel: CreditAccount,
    pub opd: CreditAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovedTotals {
    pub as_of: NaiveDate,
    pub approved_today: Decimal,
    pub approved_this_month: Decimal,
    pub stationary_this_month: Decimal,
}

/// An approved claim together with its current approval record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovedClaim {
    pub claim: Claim,
    pub approval: Option<ClaimApproval>,
}

/// Approved Fuel and OPD amounts requested within an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovedReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub employee_id: Option<Uuid>,
    pub fuel_total: Decimal,
    pub opd_total: Decimal,
    pub total: Decimal,
}

/// One employee's approved amounts for a calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmployeeMonthlyTotals {
    pub employee_id: Uuid,
    pub fuel: Decimal,
    pub opd: Decimal,
    pub stationary: Decimal,
    pub total: Decimal,
    pub last_request_date: NaiveDate,
    pub last_approval_date: Option<NaiveDate>,
}

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::ClaimError,
    models::{
        ApprovedClaim, Category, Claim, ClaimApproval, ClaimImage, ClaimStatus, CreditAccount,
        PerceptualHash,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimFilter {
    Employee(Uuid),
    Status(ClaimStatus),
}

/// Filters over Approved claims. Unset fields match everything; request-date
/// bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovedQuery {
    pub requested_from: Option<NaiveDate>,
    pub requested_to: Option<NaiveDate>,
    pub approved_on: Option<NaiveDate>,
    pub employee_id: Option<Uuid>,
}

/// Source of per-request transactions over claims, credit accounts and fingerprints.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    type Tx: ClaimTx;

    async fn begin(&self) -> Result<Self::Tx, ClaimError>;
}

/// One atomic unit of work. Dropping without `commit` rolls everything back.
///
/// `read_account` and `read_claim` lock the rows they return until the
/// transaction ends; `find_images_by_hash` serialises concurrent lookups of the
/// same fingerprint.
#[async_trait]
pub trait ClaimTx: Send {
    async fn read_account(
        &mut self,
        employee_id: Uuid,
        category: Category,
    ) -> Result<Option<CreditAccount>, ClaimError>;

    async fn write_account(&mut self, account: &CreditAccount) -> Result<(), ClaimError>;

    async fn read_claim(&mut self, claim_id: Uuid) -> Result<Option<Claim>, ClaimError>;

    async fn insert_claim(&mut self, claim: &Claim) -> Result<(), ClaimError>;

    async fn update_claim(&mut self, claim: &Claim) -> Result<(), ClaimError>;

    /// Removes the claim with its images and approval, returning the removed images.
    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError>;

    async fn list_claims(&mut self, filter: ClaimFilter) -> Result<Vec<Claim>, ClaimError>;

    async fn list_approved(
        &mut self,
        query: ApprovedQuery,
    ) -> Result<Vec<ApprovedClaim>, ClaimError>;

    async fn read_approval(&mut self, claim_id: Uuid) -> Result<Option<ClaimApproval>, ClaimError>;

    async fn upsert_approval(&mut self, approval: &ClaimApproval) -> Result<(), ClaimError>;

    async fn find_images_by_hash(
        &mut self,
        hash: PerceptualHash,
    ) -> Result<Vec<ClaimImage>, ClaimError>;

    async fn list_images(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError>;

    async fn insert_image(&mut self, image: &ClaimImage) -> Result<(), ClaimError>;

    async fn commit(self) -> Result<(), ClaimError>;
}

/// Where receipt files live. Returns the path recorded on the `ClaimImage`.
#[async_trait]
pub trait ReceiptStorage: Send + Sync {
    async fn put(&self, image_id: Uuid, extension: &str, bytes: &[u8])
    -> Result<String, ClaimError>;

    async fn remove(&self, storage_path: &str) -> Result<(), ClaimError>;
}

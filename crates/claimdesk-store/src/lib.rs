use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use claimdesk_core::{
    ApprovedClaim, ApprovedQuery, Category, Claim, ClaimApproval, ClaimError, ClaimFilter,
    ClaimImage, ClaimStatus, ClaimStore, ClaimTx, CreditAccount, PerceptualHash, ReceiptStorage,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<(Uuid, Category), CreditAccount>,
    // insertion order doubles as filing order
    claims: Vec<Claim>,
    images: Vec<ClaimImage>,
    approvals: HashMap<Uuid, ClaimApproval>,
}

/// Process-local store. Transactions are serialised on a single lock and work
/// on a copy of the tables that only replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryClaimStore {
    tables: Arc<Mutex<Tables>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryClaimStore {
    /// Makes every following commit fail with a storage error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_commit: bool,
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, ClaimError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();

        Ok(InMemoryTx {
            guard,
            working,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        })
    }
}

#[async_trait]
impl ClaimTx for InMemoryTx {
    async fn read_account(
        &mut self,
        employee_id: Uuid,
        category: Category,
    ) -> Result<Option<CreditAccount>, ClaimError> {
        Ok(self.working.accounts.get(&(employee_id, category)).cloned())
    }

    async fn write_account(&mut self, account: &CreditAccount) -> Result<(), ClaimError> {
        self.working
            .accounts
            .insert((account.employee_id, account.category), account.clone());
        Ok(())
    }

    async fn read_claim(&mut self, claim_id: Uuid) -> Result<Option<Claim>, ClaimError> {
        Ok(self
            .working
            .claims
            .iter()
            .find(|claim| claim.id == claim_id)
            .cloned())
    }

    async fn insert_claim(&mut self, claim: &Claim) -> Result<(), ClaimError> {
        if self.working.claims.iter().any(|existing| existing.id == claim.id) {
            return Err(ClaimError::Storage(format!("claim {} already exists", claim.id)));
        }
        self.working.claims.push(claim.clone());
        Ok(())
    }

    async fn update_claim(&mut self, claim: &Claim) -> Result<(), ClaimError> {
        let existing = self
            .working
            .claims
            .iter_mut()
            .find(|existing| existing.id == claim.id)
            .ok_or_else(|| ClaimError::claim_not_found(claim.id))?;
        *existing = claim.clone();
        Ok(())
    }

    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError> {
        let (removed, kept): (Vec<ClaimImage>, Vec<ClaimImage>) = std::mem::take(&mut self.working.images)
            .into_iter()
            .partition(|image| image.claim_id == claim_id);
        self.working.images = kept;
        self.working.approvals.remove(&claim_id);
        self.working.claims.retain(|claim| claim.id != claim_id);
        Ok(removed)
    }

    async fn list_claims(&mut self, filter: ClaimFilter) -> Result<Vec<Claim>, ClaimError> {
        Ok(self
            .working
            .claims
            .iter()
            .rev()
            .filter(|claim| match filter {
                ClaimFilter::Employee(employee_id) => claim.employee_id == employee_id,
                ClaimFilter::Status(status) => claim.status == status,
            })
            .cloned()
            .collect())
    }

    async fn list_approved(
        &mut self,
        query: ApprovedQuery,
    ) -> Result<Vec<ApprovedClaim>, ClaimError> {
        let approvals = &self.working.approvals;

        Ok(self
            .working
            .claims
            .iter()
            .rev()
            .filter(|claim| claim.status == ClaimStatus::Approved)
            .filter(|claim| query.employee_id.is_none_or(|id| claim.employee_id == id))
            .filter(|claim| query.requested_from.is_none_or(|from| claim.request_date >= from))
            .filter(|claim| query.requested_to.is_none_or(|to| claim.request_date <= to))
            .map(|claim| ApprovedClaim {
                claim: claim.clone(),
                approval: approvals.get(&claim.id).cloned(),
            })
            .filter(|approved| {
                query.approved_on.is_none_or(|day| {
                    approved
                        .approval
                        .as_ref()
                        .is_some_and(|approval| approval.approval_date == day)
                })
            })
            .collect())
    }

    async fn read_approval(&mut self, claim_id: Uuid) -> Result<Option<ClaimApproval>, ClaimError> {
        Ok(self.working.approvals.get(&claim_id).cloned())
    }

    async fn upsert_approval(&mut self, approval: &ClaimApproval) -> Result<(), ClaimError> {
        self.working
            .approvals
            .insert(approval.claim_id, approval.clone());
        Ok(())
    }

    async fn find_images_by_hash(
        &mut self,
        hash: PerceptualHash,
    ) -> Result<Vec<ClaimImage>, ClaimError> {
        Ok(self
            .working
            .images
            .iter()
            .filter(|image| image.hash == hash)
            .cloned()
            .collect())
    }

    async fn list_images(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError> {
        Ok(self
            .working
            .images
            .iter()
            .filter(|image| image.claim_id == claim_id)
            .cloned()
            .collect())
    }

    async fn insert_image(&mut self, image: &ClaimImage) -> Result<(), ClaimError> {
        self.working.images.push(image.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), ClaimError> {
        if self.fail_commit {
            return Err(ClaimError::Storage("commit failed".to_string()));
        }
        let mut guard = self.guard;
        *guard = self.working;
        Ok(())
    }
}

/// Receipt files kept in memory, keyed by the path handed back from `put`.
#[derive(Clone, Default)]
pub struct InMemoryReceiptStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryReceiptStorage {
    pub async fn contains(&self, storage_path: &str) -> bool {
        self.files.lock().await.contains_key(storage_path)
    }

    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[async_trait]
impl ReceiptStorage for InMemoryReceiptStorage {
    async fn put(
        &self,
        image_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, ClaimError> {
        let storage_path = format!("{image_id}.{extension}");
        self.files
            .lock()
            .await
            .insert(storage_path.clone(), bytes.to_vec());
        Ok(storage_path)
    }

    async fn remove(&self, storage_path: &str) -> Result<(), ClaimError> {
        self.files.lock().await.remove(storage_path);
        Ok(())
    }
}

use chrono::{NaiveDate, Utc};
use claimdesk_core::{
    Category, Claim, ClaimApproval, ClaimError, ClaimImage, ClaimStatus, ClaimStore, ClaimTx,
    Decision, NewClaim, ReceiptStorage,
};
use claimdesk_fingerprint::ensure_unique;
use claimdesk_ledger::{BalanceEffect, apply_status_transition, balance_effect, revise_amount};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::screening::{ScreenedReceipt, screen_uploads_blocking};

/// Exclusive upper bound for stored money values, which are `NUMERIC(14, 2)`.
pub(crate) const AMOUNT_CEILING: i64 = 1_000_000_000_000;

/// Claim workflow over a transactional store and a receipt file store.
///
/// Each public operation opens exactly one transaction and commits it only
/// after every check and write has succeeded.
#[derive(Clone)]
pub struct ClaimService<S, R> {
    pub(crate) store: S,
    pub(crate) receipts: R,
}

impl<S, R> ClaimService<S, R>
where
    S: ClaimStore,
    R: ReceiptStorage,
{
    pub fn new(store: S, receipts: R) -> Self {
        Self { store, receipts }
    }

    /// Files a new Pending claim and debits its amount.
    ///
    /// All receipts are decoded and fingerprinted first; then, inside the
    /// transaction, every fingerprint is checked before the balance is touched.
    pub async fn submit_claim(&self, new_claim: NewClaim) -> Result<Claim, ClaimError> {
        validate_amount(new_claim.amount)?;
        let screened = screen_uploads_blocking(new_claim.images).await?;

        let claim = Claim {
            id: Uuid::new_v4(),
            employee_id: new_claim.employee_id,
            category: new_claim.category,
            amount: new_claim.amount,
            status: ClaimStatus::Pending,
            request_date: today(),
            message: new_claim.message.trim().to_string(),
        };

        let mut written = Vec::new();
        if let Err(err) = self.file_claim(&claim, &screened, &mut written).await {
            self.discard_receipts(&written).await;
            return Err(err);
        }

        info!(
            claim_id = %claim.id,
            employee_id = %claim.employee_id,
            category = %claim.category,
            amount = %claim.amount,
            images = screened.len(),
            "claim submitted"
        );
        Ok(claim)
    }

    async fn file_claim(
        &self,
        claim: &Claim,
        screened: &[ScreenedReceipt],
        written: &mut Vec<String>,
    ) -> Result<(), ClaimError> {
        let mut tx = self.store.begin().await?;

        if !claim.category.is_metered() {
            ensure_known_employee(&mut tx, claim.employee_id).await?;
        }

        let fingerprints: Vec<_> = screened
            .iter()
            .map(|receipt| (receipt.upload.file_name.clone(), receipt.hash))
            .collect();
        ensure_unique(&mut tx, &fingerprints).await?;

        apply_status_transition(&mut tx, claim, None, Some(ClaimStatus::Pending)).await?;
        tx.insert_claim(claim).await?;

        for receipt in screened {
            let image_id = Uuid::new_v4();
            let storage_path = self
                .receipts
                .put(image_id, &receipt.extension, &receipt.upload.bytes)
                .await?;
            written.push(storage_path.clone());

            tx.insert_image(&ClaimImage {
                id: image_id,
                claim_id: claim.id,
                storage_path,
                hash: receipt.hash,
            })
            .await?;
        }

        tx.commit().await
    }

    /// Changes amount and message of a Pending claim, moving the balance hold
    /// by the difference. The request date is re-stamped.
    pub async fn edit_claim(
        &self,
        claim_id: Uuid,
        new_amount: Decimal,
        new_message: &str,
    ) -> Result<Claim, ClaimError> {
        validate_amount(new_amount)?;
        let mut tx = self.store.begin().await?;

        let mut claim = load_claim(&mut tx, claim_id).await?;
        ensure_pending(&claim)?;

        revise_amount(&mut tx, claim_id, new_amount).await?;
        claim.amount = new_amount;
        claim.message = new_message.trim().to_string();
        claim.request_date = today();
        tx.update_claim(&claim).await?;
        tx.commit().await?;

        info!(%claim_id, amount = %claim.amount, "claim edited");
        Ok(claim)
    }

    /// Withdraws a Pending claim, restoring its amount and dropping its receipts.
    pub async fn delete_claim(&self, claim_id: Uuid) -> Result<(), ClaimError> {
        let mut tx = self.store.begin().await?;

        let claim = load_claim(&mut tx, claim_id).await?;
        ensure_pending(&claim)?;

        apply_status_transition(&mut tx, &claim, Some(claim.status), None).await?;
        let removed = tx.delete_claim(claim_id).await?;
        tx.commit().await?;

        let paths: Vec<String> = removed.into_iter().map(|image| image.storage_path).collect();
        self.discard_receipts(&paths).await;

        info!(%claim_id, employee_id = %claim.employee_id, "claim deleted");
        Ok(())
    }

    /// First administrator decision on a claim.
    pub async fn decide_claim(
        &self,
        claim_id: Uuid,
        decision: Decision,
        admin_id: Uuid,
        note: &str,
    ) -> Result<Claim, ClaimError> {
        let (claim, previous) = self.record_decision(claim_id, decision, admin_id, note).await?;
        info!(%claim_id, %admin_id, from = %previous, to = %claim.status, "claim decided");
        Ok(claim)
    }

    /// Overturns an earlier decision, e.g. re-approving a rejected claim.
    pub async fn revise_decision(
        &self,
        claim_id: Uuid,
        decision: Decision,
        admin_id: Uuid,
        note: &str,
    ) -> Result<Claim, ClaimError> {
        let (claim, previous) = self.record_decision(claim_id, decision, admin_id, note).await?;
        info!(%claim_id, %admin_id, from = %previous, to = %claim.status, "decision revised");
        Ok(claim)
    }

    async fn record_decision(
        &self,
        claim_id: Uuid,
        decision: Decision,
        admin_id: Uuid,
        note: &str,
    ) -> Result<(Claim, ClaimStatus), ClaimError> {
        let mut tx = self.store.begin().await?;

        let mut claim = load_claim(&mut tx, claim_id).await?;
        let previous = claim.status;
        let next = decision.status();

        // A rejected claim released its receipts; taking them back needs them free.
        if balance_effect(Some(previous), Some(next)) == BalanceEffect::Debit {
            let fingerprints: Vec<_> = tx
                .list_images(claim_id)
                .await?
                .into_iter()
                .map(|image| (image.storage_path, image.hash))
                .collect();
            ensure_unique(&mut tx, &fingerprints).await?;
        }

        apply_status_transition(&mut tx, &claim, Some(previous), Some(next)).await?;
        claim.status = next;
        tx.update_claim(&claim).await?;
        tx.upsert_approval(&ClaimApproval {
            claim_id,
            admin_id,
            approval_date: today(),
            admin_message: note.trim().to_string(),
        })
        .await?;
        tx.commit().await?;

        Ok((claim, previous))
    }

    async fn discard_receipts(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.receipts.remove(path).await {
                error!(storage_path = %path, "failed to remove receipt file: {err}");
            }
        }
    }
}

pub(crate) async fn load_claim<T>(tx: &mut T, claim_id: Uuid) -> Result<Claim, ClaimError>
where
    T: ClaimTx + ?Sized,
{
    tx.read_claim(claim_id)
        .await?
        .ok_or_else(|| ClaimError::claim_not_found(claim_id))
}

/// Unmetered claims never touch an account, so the employee is checked here.
async fn ensure_known_employee<T>(tx: &mut T, employee_id: Uuid) -> Result<(), ClaimError>
where
    T: ClaimTx + ?Sized,
{
    if tx.read_account(employee_id, Category::Fuel).await?.is_none() {
        warn!(%employee_id, "claim filed for unknown employee");
        return Err(ClaimError::NotFound(format!("employee {employee_id}")));
    }
    Ok(())
}

fn ensure_pending(claim: &Claim) -> Result<(), ClaimError> {
    if claim.status != ClaimStatus::Pending {
        warn!(claim_id = %claim.id, status = %claim.status, "change refused on decided claim");
        return Err(ClaimError::NotPending {
            claim_id: claim.id,
            status: claim.status,
        });
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), ClaimError> {
    if amount <= Decimal::ZERO {
        return Err(ClaimError::Validation(format!(
            "amount must be greater than zero, found {amount}"
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(ClaimError::Validation(format!(
            "amount must have at most two decimal places, found {amount}"
        )));
    }
    if amount >= Decimal::from(AMOUNT_CEILING) {
        return Err(ClaimError::Validation(format!(
            "amount must be below {AMOUNT_CEILING}, found {amount}"
        )));
    }
    Ok(())
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

use claimdesk_core::{
    ActiveClaim, ClaimError, ClaimStatus, ClaimTx, DuplicateStatus, PerceptualHash,
};
use tracing::warn;

/// Whether `hash` already belongs to a claim that is still Pending or Approved.
///
/// Every stored image with exactly this fingerprint is inspected. An Approved
/// owner takes precedence over a Pending one; Rejected owners free the hash.
pub async fn check_duplicate<T>(
    tx: &mut T,
    hash: PerceptualHash,
) -> Result<DuplicateStatus, ClaimError>
where
    T: ClaimTx + ?Sized,
{
    let mut pending = None;

    for image in tx.find_images_by_hash(hash).await? {
        let Some(owner) = tx.read_claim(image.claim_id).await? else {
            continue;
        };

        match owner.status {
            ClaimStatus::Approved => {
                let approved_on = tx
                    .read_approval(owner.id)
                    .await?
                    .map(|approval| approval.approval_date)
                    .unwrap_or(owner.request_date);
                return Ok(DuplicateStatus::Active(ActiveClaim::Approved {
                    claim_id: owner.id,
                    approved_on,
                }));
            }
            ClaimStatus::Pending => {
                pending.get_or_insert(ActiveClaim::Pending { claim_id: owner.id });
            }
            ClaimStatus::Rejected => {}
        }
    }

    Ok(pending.map_or(DuplicateStatus::Clear, DuplicateStatus::Active))
}

/// Checks every fingerprint of a submission before anything is written.
///
/// Hashes are visited in sorted order so concurrent submissions take the
/// store's per-hash locks in the same sequence. The first conflict is
/// returned as `DuplicateImage` for the named file.
pub async fn ensure_unique<T>(
    tx: &mut T,
    receipts: &[(String, PerceptualHash)],
) -> Result<(), ClaimError>
where
    T: ClaimTx + ?Sized,
{
    let mut ordered: Vec<&(String, PerceptualHash)> = receipts.iter().collect();
    ordered.sort_by_key(|(_, hash)| *hash);
    ordered.dedup_by_key(|(_, hash)| *hash);

    for (file_name, hash) in ordered {
        if let DuplicateStatus::Active(existing) = check_duplicate(tx, *hash).await? {
            warn!(
                file_name = %file_name,
                %hash,
                existing_claim_id = %existing.claim_id(),
                "duplicate receipt blocked"
            );
            return Err(ClaimError::DuplicateImage {
                file_name: file_name.clone(),
                existing,
            });
        }
    }
    Ok(())
}

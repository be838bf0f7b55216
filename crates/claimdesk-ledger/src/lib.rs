//! Credit-balance ledger.
//!
//! Every function here runs inside the caller's [`ClaimTx`]: it re-reads the
//! account row (locked by the store) and writes the new balance back through
//! the same transaction, so a failed check leaves nothing behind once the
//! caller drops the transaction.

use claimdesk_core::{Category, Claim, ClaimError, ClaimStatus, ClaimTx, CreditAccount};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    None,
    Debit,
    Credit,
}

/// Balance effect of moving a claim between lifecycle states.
///
/// `from == None` is a claim being filed, `to == None` is a claim being deleted.
pub fn balance_effect(from: Option<ClaimStatus>, to: Option<ClaimStatus>) -> BalanceEffect {
    use ClaimStatus::{Approved, Pending, Rejected};

    match (from, to) {
        (None, Some(Pending)) => BalanceEffect::Debit,
        (Some(Pending), Some(Rejected)) => BalanceEffect::Credit,
        (Some(Pending), None) => BalanceEffect::Credit,
        (Some(Pending), Some(Approved)) => BalanceEffect::None,
        (Some(Approved), Some(Rejected)) => BalanceEffect::Credit,
        (Some(Rejected), Some(Approved)) => BalanceEffect::Debit,
        _ => BalanceEffect::None,
    }
}

pub async fn debit<T>(
    tx: &mut T,
    employee_id: Uuid,
    category: Category,
    amount: Decimal,
) -> Result<(), ClaimError>
where
    T: ClaimTx + ?Sized,
{
    if !category.is_metered() {
        return Ok(());
    }
    ensure_non_negative(amount)?;

    let mut account = load_account(tx, employee_id, category).await?;
    if amount > account.balance {
        warn!(
            %employee_id,
            %category,
            balance = %account.balance,
            requested = %amount,
            "debit rejected: insufficient balance"
        );
        return Err(ClaimError::InsufficientBalance {
            category,
            balance: account.balance,
            requested: amount,
        });
    }

    account.balance -= amount;
    tx.write_account(&account).await
}

/// Restores `amount` to the balance. The limit is not enforced here; a
/// balance that ends above it is logged and kept.
pub async fn credit<T>(
    tx: &mut T,
    employee_id: Uuid,
    category: Category,
    amount: Decimal,
) -> Result<(), ClaimError>
where
    T: ClaimTx + ?Sized,
{
    if !category.is_metered() {
        return Ok(());
    }
    ensure_non_negative(amount)?;

    let mut account = load_account(tx, employee_id, category).await?;
    account.balance = account.balance.checked_add(amount).ok_or_else(|| {
        ClaimError::Validation(format!(
            "restoring {amount} would overflow the {category} balance"
        ))
    })?;
    if account.balance > account.limit {
        warn!(
            %employee_id,
            %category,
            balance = %account.balance,
            limit = %account.limit,
            "credit restored balance above limit"
        );
    }
    tx.write_account(&account).await
}

/// Moves the claim's hold from its stored amount to `new_amount`.
///
/// Only the difference is checked against the balance, so shrinking a claim
/// always succeeds. Returns the claim as it was before the revision; the
/// caller persists the new amount.
pub async fn revise_amount<T>(
    tx: &mut T,
    claim_id: Uuid,
    new_amount: Decimal,
) -> Result<Claim, ClaimError>
where
    T: ClaimTx + ?Sized,
{
    ensure_non_negative(new_amount)?;

    let claim = tx
        .read_claim(claim_id)
        .await?
        .ok_or_else(|| ClaimError::claim_not_found(claim_id))?;

    let delta = new_amount - claim.amount;
    if delta > Decimal::ZERO {
        debit(tx, claim.employee_id, claim.category, delta).await?;
    } else if delta < Decimal::ZERO {
        credit(tx, claim.employee_id, claim.category, -delta).await?;
    }

    info!(
        %claim_id,
        previous = %claim.amount,
        revised = %new_amount,
        "claim amount revised"
    );
    Ok(claim)
}

/// Applies the balance side of a lifecycle move for `claim`; see [`balance_effect`].
pub async fn apply_status_transition<T>(
    tx: &mut T,
    claim: &Claim,
    from: Option<ClaimStatus>,
    to: Option<ClaimStatus>,
) -> Result<BalanceEffect, ClaimError>
where
    T: ClaimTx + ?Sized,
{
    let effect = balance_effect(from, to);
    match effect {
        BalanceEffect::Debit => debit(tx, claim.employee_id, claim.category, claim.amount).await?,
        BalanceEffect::Credit => {
            credit(tx, claim.employee_id, claim.category, claim.amount).await?
        }
        BalanceEffect::None => {}
    }

    if effect != BalanceEffect::None && claim.category.is_metered() {
        info!(
            claim_id = %claim.id,
            employee_id = %claim.employee_id,
            category = %claim.category,
            amount = %claim.amount,
            ?from,
            ?to,
            ?effect,
            "balance transition applied"
        );
    }
    Ok(effect)
}

async fn load_account<T>(
    tx: &mut T,
    employee_id: Uuid,
    category: Category,
) -> Result<CreditAccount, ClaimError>
where
    T: ClaimTx + ?Sized,
{
    tx.read_account(employee_id, category)
        .await?
        .ok_or_else(|| ClaimError::account_not_found(employee_id, category))
}

fn ensure_non_negative(amount: Decimal) -> Result<(), ClaimError> {
    if amount < Decimal::ZERO {
        return Err(ClaimError::Validation(format!(
            "amount must not be negative, found {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use claimdesk_core::{ClaimStore, ClaimTx};
    use claimdesk_store::InMemoryClaimStore;

    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    async fn store_with_fuel(limit: i64, balance: i64) -> (InMemoryClaimStore, Uuid) {
        let store = InMemoryClaimStore::default();
        let employee_id = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        tx.write_account(&CreditAccount {
            employee_id,
            category: Category::Fuel,
            limit: dec(limit),
            balance: dec(balance),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (store, employee_id)
    }

    async fn fuel_balance(store: &InMemoryClaimStore, employee_id: Uuid) -> Decimal {
        let mut tx = store.begin().await.unwrap();
        tx.read_account(employee_id, Category::Fuel)
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    fn claim(employee_id: Uuid, category: Category, amount: i64, status: ClaimStatus) -> Claim {
        Claim {
            id: Uuid::new_v4(),
            employee_id,
            category,
            amount: dec(amount),
            status,
            request_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            message: String::new(),
        }
    }

    #[test]
    fn transition_table() {
        use ClaimStatus::*;

        assert_eq!(balance_effect(None, Some(Pending)), BalanceEffect::Debit);
        assert_eq!(balance_effect(Some(Pending), Some(Rejected)), BalanceEffect::Credit);
        assert_eq!(balance_effect(Some(Pending), None), BalanceEffect::Credit);
        assert_eq!(balance_effect(Some(Pending), Some(Approved)), BalanceEffect::None);
        assert_eq!(balance_effect(Some(Approved), Some(Rejected)), BalanceEffect::Credit);
        assert_eq!(balance_effect(Some(Rejected), Some(Approved)), BalanceEffect::Debit);
    }

    #[test]
    fn unmodeled_transitions_are_no_ops() {
        use ClaimStatus::*;

        assert_eq!(balance_effect(Some(Approved), Some(Approved)), BalanceEffect::None);
        assert_eq!(balance_effect(Some(Rejected), Some(Rejected)), BalanceEffect::None);
        assert_eq!(balance_effect(Some(Approved), None), BalanceEffect::None);
        assert_eq!(balance_effect(Some(Rejected), Some(Pending)), BalanceEffect::None);
    }

    #[tokio::test]
    async fn debit_reduces_balance() {
        let (store, employee_id) = store_with_fuel(10_000, 10_000).await;

        let mut tx = store.begin().await.unwrap();
        debit(&mut tx, employee_id, Category::Fuel, dec(3_000)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fuel_balance(&store, employee_id).await, dec(7_000));
    }

    #[tokio::test]
    async fn debit_beyond_balance_fails_without_change() {
        let (store, employee_id) = store_with_fuel(10_000, 7_000).await;

        let mut tx = store.begin().await.unwrap();
        let err = debit(&mut tx, employee_id, Category::Fuel, dec(8_000))
            .await
            .unwrap_err();
        drop(tx);

        match err {
            ClaimError::InsufficientBalance {
                balance, requested, ..
            } => {
                assert_eq!(balance, dec(7_000));
                assert_eq!(requested, dec(8_000));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fuel_balance(&store, employee_id).await, dec(7_000));
    }

    #[tokio::test]
    async fn debit_of_exact_balance_reaches_zero() {
        let (store, employee_id) = store_with_fuel(500, 500).await;

        let mut tx = store.begin().await.unwrap();
        debit(&mut tx, employee_id, Category::Fuel, dec(500)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fuel_balance(&store, employee_id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn credit_is_not_clamped_to_limit() {
        let (store, employee_id) = store_with_fuel(1_000, 900).await;

        let mut tx = store.begin().await.unwrap();
        credit(&mut tx, employee_id, Category::Fuel, dec(300)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fuel_balance(&store, employee_id).await, dec(1_200));
    }

    #[tokio::test]
    async fn credit_overflow_is_rejected_without_change() {
        let (store, employee_id) = store_with_fuel(1_000, 0).await;
        let mut tx = store.begin().await.unwrap();
        tx.write_account(&CreditAccount {
            employee_id,
            category: Category::Fuel,
            limit: dec(1_000),
            balance: Decimal::MAX,
        })
        .await
        .unwrap();

        let err = credit(&mut tx, employee_id, Category::Fuel, dec(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Validation(_)));
        let account = tx
            .read_account(employee_id, Category::Fuel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Decimal::MAX);
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let store = InMemoryClaimStore::default();
        let mut tx = store.begin().await.unwrap();

        let err = debit(&mut tx, Uuid::new_v4(), Category::Opd, dec(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::NotFound(_)));
    }

    #[tokio::test]
    async fn stationary_is_unmetered() {
        let store = InMemoryClaimStore::default();
        let mut tx = store.begin().await.unwrap();

        debit(&mut tx, Uuid::new_v4(), Category::Stationary, dec(1_000_000))
            .await
            .unwrap();
        credit(&mut tx, Uuid::new_v4(), Category::Stationary, dec(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn revise_amount_checks_only_the_increase() {
        let (store, employee_id) = store_with_fuel(10_000, 7_000).await;
        let existing = claim(employee_id, Category::Fuel, 3_000, ClaimStatus::Pending);

        let mut tx = store.begin().await.unwrap();
        tx.insert_claim(&existing).await.unwrap();
        let previous = revise_amount(&mut tx, existing.id, dec(5_000)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(previous.amount, dec(3_000));
        assert_eq!(fuel_balance(&store, employee_id).await, dec(5_000));
    }

    #[tokio::test]
    async fn revise_amount_down_restores_difference() {
        let (store, employee_id) = store_with_fuel(10_000, 7_000).await;
        let existing = claim(employee_id, Category::Fuel, 3_000, ClaimStatus::Pending);

        let mut tx = store.begin().await.unwrap();
        tx.insert_claim(&existing).await.unwrap();
        revise_amount(&mut tx, existing.id, dec(1_000)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fuel_balance(&store, employee_id).await, dec(9_000));
    }

    #[tokio::test]
    async fn revise_amount_increase_beyond_balance_fails() {
        let (store, employee_id) = store_with_fuel(10_000, 1_000).await;
        let existing = claim(employee_id, Category::Fuel, 9_000, ClaimStatus::Pending);

        let mut tx = store.begin().await.unwrap();
        tx.insert_claim(&existing).await.unwrap();
        let err = revise_amount(&mut tx, existing.id, dec(10_500))
            .await
            .unwrap_err();

        assert!(matches!(err, ClaimError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn revise_amount_of_unknown_claim_is_not_found() {
        let store = InMemoryClaimStore::default();
        let mut tx = store.begin().await.unwrap();

        let err = revise_amount(&mut tx, Uuid::new_v4(), dec(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::NotFound(_)));
    }

    #[tokio::test]
    async fn reject_then_reapprove_restores_original_balance() {
        let (store, employee_id) = store_with_fuel(10_000, 7_000).await;
        let approved = claim(employee_id, Category::Fuel, 3_000, ClaimStatus::Approved);

        let mut tx = store.begin().await.unwrap();
        apply_status_transition(
            &mut tx,
            &approved,
            Some(ClaimStatus::Approved),
            Some(ClaimStatus::Rejected),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(fuel_balance(&store, employee_id).await, dec(10_000));

        let mut tx = store.begin().await.unwrap();
        apply_status_transition(
            &mut tx,
            &approved,
            Some(ClaimStatus::Rejected),
            Some(ClaimStatus::Approved),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(fuel_balance(&store, employee_id).await, dec(7_000));
    }
}

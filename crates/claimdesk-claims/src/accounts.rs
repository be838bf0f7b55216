use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use claimdesk_core::{
    ApprovedClaim, ApprovedQuery, ApprovedReport, ApprovedTotals, Category, Claim, ClaimDetails,
    ClaimError, ClaimFilter, ClaimStatus, ClaimStore, ClaimTx, CreditAccount, CreditSummary,
    EmployeeMonthlyTotals, ReceiptStorage,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::service::{AMOUNT_CEILING, ClaimService, load_claim};

impl<S, R> ClaimService<S, R>
where
    S: ClaimStore,
    R: ReceiptStorage,
{
    /// Opens Fuel and OPD accounts for a new employee with full balances.
    pub async fn open_credit_accounts(
        &self,
        employee_id: Uuid,
        fuel_limit: Decimal,
        opd_limit: Decimal,
    ) -> Result<CreditSummary, ClaimError> {
        validate_limit("fuel limit", fuel_limit)?;
        validate_limit("OPD limit", opd_limit)?;

        let mut tx = self.store.begin().await?;
        for category in Category::METERED {
            if tx.read_account(employee_id, category).await?.is_some() {
                return Err(ClaimError::Validation(format!(
                    "employee {employee_id} already has a {category} credit account"
                )));
            }
        }

        let fuel = CreditAccount {
            employee_id,
            category: Category::Fuel,
            limit: fuel_limit,
            balance: fuel_limit,
        };
        let opd = CreditAccount {
            employee_id,
            category: Category::Opd,
            limit: opd_limit,
            balance: opd_limit,
        };
        tx.write_account(&fuel).await?;
        tx.write_account(&opd).await?;
        tx.commit().await?;

        info!(%employee_id, %fuel_limit, %opd_limit, "credit accounts opened");
        Ok(CreditSummary {
            employee_id,
            fuel,
            opd,
        })
    }

    /// Administrator override of an account's limit and balance.
    pub async fn set_credit_account(
        &self,
        employee_id: Uuid,
        category: Category,
        limit: Decimal,
        balance: Decimal,
    ) -> Result<CreditAccount, ClaimError> {
        if !category.is_metered() {
            return Err(ClaimError::InvalidCategory(category.to_string()));
        }
        validate_limit("limit", limit)?;
        validate_limit("balance", balance)?;

        let mut tx = self.store.begin().await?;
        if tx.read_account(employee_id, category).await?.is_none() {
            return Err(ClaimError::account_not_found(employee_id, category));
        }

        let account = CreditAccount {
            employee_id,
            category,
            limit,
            balance,
        };
        tx.write_account(&account).await?;
        tx.commit().await?;

        info!(%employee_id, %category, %limit, %balance, "credit account overridden");
        Ok(account)
    }

    pub async fn credit_summary(&self, employee_id: Uuid) -> Result<CreditSummary, ClaimError> {
        let mut tx = self.store.begin().await?;
        let fuel = read_account(&mut tx, employee_id, Category::Fuel).await?;
        let opd = read_account(&mut tx, employee_id, Category::Opd).await?;

        Ok(CreditSummary {
            employee_id,
            fuel,
            opd,
        })
    }

    pub async fn claim_details(&self, claim_id: Uuid) -> Result<ClaimDetails, ClaimError> {
        let mut tx = self.store.begin().await?;
        let claim = load_claim(&mut tx, claim_id).await?;
        let images = tx.list_images(claim_id).await?;
        let approval = tx.read_approval(claim_id).await?;

        Ok(ClaimDetails {
            claim,
            images,
            approval,
        })
    }

    /// An employee's claims, newest first.
    pub async fn list_employee_claims(&self, employee_id: Uuid) -> Result<Vec<Claim>, ClaimError> {
        let mut tx = self.store.begin().await?;
        tx.list_claims(ClaimFilter::Employee(employee_id)).await
    }

    pub async fn list_claims_by_status(
        &self,
        status: ClaimStatus,
    ) -> Result<Vec<Claim>, ClaimError> {
        let mut tx = self.store.begin().await?;
        tx.list_claims(ClaimFilter::Status(status)).await
    }

    /// Approved amounts decided on `today`, and requested in `today`'s month.
    pub async fn approved_totals(&self, today: NaiveDate) -> Result<ApprovedTotals, ClaimError> {
        let (month_start, month_end) = month_bounds(today.year(), today.month())?;
        let mut tx = self.store.begin().await?;

        let decided_today = tx
            .list_approved(ApprovedQuery {
                approved_on: Some(today),
                ..ApprovedQuery::default()
            })
            .await?;
        let this_month = tx
            .list_approved(ApprovedQuery {
                requested_from: Some(month_start),
                requested_to: Some(month_end),
                ..ApprovedQuery::default()
            })
            .await?;

        Ok(ApprovedTotals {
            as_of: today,
            approved_today: sum_amounts(&decided_today, |_| true),
            approved_this_month: sum_amounts(&this_month, |_| true),
            stationary_this_month: sum_amounts(&this_month, |category| {
                category == Category::Stationary
            }),
        })
    }

    /// Approved Fuel and OPD amounts requested between `start` and `end`
    /// inclusive, for everyone or for one employee.
    pub async fn approved_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        employee_id: Option<Uuid>,
    ) -> Result<ApprovedReport, ClaimError> {
        if start > end {
            return Err(ClaimError::Validation(format!(
                "report start {start} is after end {end}"
            )));
        }

        let mut tx = self.store.begin().await?;
        let approved = tx
            .list_approved(ApprovedQuery {
                requested_from: Some(start),
                requested_to: Some(end),
                employee_id,
                ..ApprovedQuery::default()
            })
            .await?;

        let fuel_total = sum_amounts(&approved, |category| category == Category::Fuel);
        let opd_total = sum_amounts(&approved, |category| category == Category::Opd);
        Ok(ApprovedReport {
            start,
            end,
            employee_id,
            fuel_total,
            opd_total,
            total: fuel_total + opd_total,
        })
    }

    /// Per-employee approved amounts for claims requested in one calendar month,
    /// ordered by employee id.
    pub async fn monthly_breakdown(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<EmployeeMonthlyTotals>, ClaimError> {
        let (month_start, month_end) = month_bounds(year, month)?;
        let mut tx = self.store.begin().await?;
        let approved = tx
            .list_approved(ApprovedQuery {
                requested_from: Some(month_start),
                requested_to: Some(month_end),
                ..ApprovedQuery::default()
            })
            .await?;

        let mut by_employee: BTreeMap<Uuid, EmployeeMonthlyTotals> = BTreeMap::new();
        for ApprovedClaim { claim, approval } in approved {
            let row = by_employee
                .entry(claim.employee_id)
                .or_insert_with(|| EmployeeMonthlyTotals {
                    employee_id: claim.employee_id,
                    fuel: Decimal::ZERO,
                    opd: Decimal::ZERO,
                    stationary: Decimal::ZERO,
                    total: Decimal::ZERO,
                    last_request_date: claim.request_date,
                    last_approval_date: None,
                });

            match claim.category {
                Category::Fuel => row.fuel += claim.amount,
                Category::Opd => row.opd += claim.amount,
                Category::Stationary => row.stationary += claim.amount,
            }
            row.total += claim.amount;
            row.last_request_date = row.last_request_date.max(claim.request_date);
            let approved_on = approval.map(|approval| approval.approval_date);
            row.last_approval_date = row.last_approval_date.max(approved_on);
        }

        Ok(by_employee.into_values().collect())
    }
}

async fn read_account<T>(
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

fn validate_limit(field: &str, value: Decimal) -> Result<(), ClaimError> {
    if value < Decimal::ZERO {
        return Err(ClaimError::Validation(format!(
            "{field} must not be negative, found {value}"
        )));
    }
    if value >= Decimal::from(AMOUNT_CEILING) {
        return Err(ClaimError::Validation(format!(
            "{field} must be below {AMOUNT_CEILING}, found {value}"
        )));
    }
    Ok(())
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ClaimError> {
    let invalid = || ClaimError::Validation(format!("invalid month {year}-{month:02}"));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

fn sum_amounts(approved: &[ApprovedClaim], include: impl Fn(Category) -> bool) -> Decimal {
    approved
        .iter()
        .filter(|row| include(row.claim.category))
        .map(|row| row.claim.amount)
        .sum()
}

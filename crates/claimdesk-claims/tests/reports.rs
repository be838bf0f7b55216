mod common;

use chrono::NaiveDate;
use claimdesk_core::{Category, ClaimApproval, ClaimError, ClaimStore, ClaimTx, Decision};
use common::{Harness, dec, receipt};
use uuid::Uuid;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Files and approves a claim, then moves its request and approval dates.
async fn approved_claim(
    h: &Harness,
    employee_id: Uuid,
    category: Category,
    amount: i64,
    seed: u32,
    requested: NaiveDate,
    approved: NaiveDate,
) -> Uuid {
    let mut new_claim = h.claim(category, amount, vec![receipt(seed)]);
    new_claim.employee_id = employee_id;
    let claim = h.service.submit_claim(new_claim).await.unwrap();
    h.service
        .decide_claim(claim.id, Decision::Approved, h.admin_id, "")
        .await
        .unwrap();

    let mut stored = h.service.claim_details(claim.id).await.unwrap().claim;
    stored.request_date = requested;
    let mut tx = h.store.begin().await.unwrap();
    tx.update_claim(&stored).await.unwrap();
    tx.upsert_approval(&ClaimApproval {
        claim_id: claim.id,
        admin_id: h.admin_id,
        approval_date: approved,
        admin_message: String::new(),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();
    claim.id
}

#[tokio::test]
async fn approved_totals_split_today_month_and_stationary() {
    let h = Harness::new(100_000, 100_000).await;
    let me = h.employee_id;
    let today = date(2024, 2, 1);

    // requested last month, approved today
    approved_claim(&h, me, Category::Fuel, 700, 1, date(2024, 1, 31), today).await;
    approved_claim(&h, me, Category::Opd, 300, 2, today, today).await;
    approved_claim(&h, me, Category::Stationary, 50, 3, date(2024, 2, 29), date(2024, 3, 1)).await;
    // next month, outside both windows
    approved_claim(&h, me, Category::Fuel, 9_000, 4, date(2024, 3, 1), date(2024, 3, 2)).await;
    // still pending, never counted
    h.service
        .submit_claim(h.claim(Category::Fuel, 111, vec![receipt(5)]))
        .await
        .unwrap();

    let totals = h.service.approved_totals(today).await.unwrap();
    assert_eq!(totals.as_of, today);
    assert_eq!(totals.approved_today, dec(1_000));
    assert_eq!(totals.approved_this_month, dec(350));
    assert_eq!(totals.stationary_this_month, dec(50));
}

#[tokio::test]
async fn rejected_claims_leave_the_totals() {
    let h = Harness::new(10_000, 10_000).await;
    let today = date(2024, 5, 10);
    let id = approved_claim(&h, h.employee_id, Category::Opd, 400, 1, today, today).await;

    h.service
        .revise_decision(id, Decision::Rejected, h.admin_id, "")
        .await
        .unwrap();

    let totals = h.service.approved_totals(today).await.unwrap();
    assert_eq!(totals.approved_today, dec(0));
    assert_eq!(totals.approved_this_month, dec(0));
}

#[tokio::test]
async fn approved_report_sums_fuel_and_opd_in_range() {
    let h = Harness::new(100_000, 100_000).await;
    let me = h.employee_id;
    let colleague = Uuid::new_v4();
    h.service
        .open_credit_accounts(colleague, dec(100_000), dec(100_000))
        .await
        .unwrap();

    approved_claim(&h, me, Category::Fuel, 1_000, 1, date(2024, 3, 1), date(2024, 3, 2)).await;
    approved_claim(&h, me, Category::Opd, 250, 2, date(2024, 3, 31), date(2024, 4, 2)).await;
    approved_claim(&h, me, Category::Stationary, 80, 3, date(2024, 3, 15), date(2024, 3, 15)).await;
    approved_claim(&h, me, Category::Fuel, 5_000, 4, date(2024, 4, 1), date(2024, 4, 1)).await;
    approved_claim(&h, colleague, Category::Opd, 600, 5, date(2024, 3, 10), date(2024, 3, 11)).await;

    let everyone = h
        .service
        .approved_report(date(2024, 3, 1), date(2024, 3, 31), None)
        .await
        .unwrap();
    assert_eq!(everyone.fuel_total, dec(1_000));
    assert_eq!(everyone.opd_total, dec(850));
    assert_eq!(everyone.total, dec(1_850));
    assert_eq!(everyone.employee_id, None);

    let mine = h
        .service
        .approved_report(date(2024, 3, 1), date(2024, 3, 31), Some(me))
        .await
        .unwrap();
    assert_eq!(mine.fuel_total, dec(1_000));
    assert_eq!(mine.opd_total, dec(250));
    assert_eq!(mine.total, dec(1_250));
    assert_eq!(mine.employee_id, Some(me));
}

#[tokio::test]
async fn approved_report_with_reversed_range_is_invalid() {
    let h = Harness::new(1_000, 1_000).await;

    let err = h
        .service
        .approved_report(date(2024, 3, 2), date(2024, 3, 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Validation(_)));
}

#[tokio::test]
async fn monthly_breakdown_groups_by_employee() {
    let h = Harness::new(100_000, 100_000).await;
    let me = h.employee_id;
    let colleague = Uuid::new_v4();
    h.service
        .open_credit_accounts(colleague, dec(100_000), dec(100_000))
        .await
        .unwrap();

    approved_claim(&h, me, Category::Fuel, 1_000, 1, date(2024, 6, 3), date(2024, 6, 4)).await;
    approved_claim(&h, me, Category::Stationary, 40, 2, date(2024, 6, 20), date(2024, 7, 1)).await;
    approved_claim(&h, me, Category::Opd, 9_999, 3, date(2024, 7, 1), date(2024, 7, 1)).await;
    approved_claim(&h, colleague, Category::Opd, 300, 4, date(2024, 6, 30), date(2024, 6, 30)).await;

    let rows = h.service.monthly_breakdown(2024, 6).await.unwrap();
    assert_eq!(rows.len(), 2);

    let mine = rows.iter().find(|row| row.employee_id == me).unwrap();
    assert_eq!(mine.fuel, dec(1_000));
    assert_eq!(mine.opd, dec(0));
    assert_eq!(mine.stationary, dec(40));
    assert_eq!(mine.total, dec(1_040));
    assert_eq!(mine.last_request_date, date(2024, 6, 20));
    assert_eq!(mine.last_approval_date, Some(date(2024, 7, 1)));

    let theirs = rows.iter().find(|row| row.employee_id == colleague).unwrap();
    assert_eq!(theirs.opd, dec(300));
    assert_eq!(theirs.total, dec(300));

    let ids: Vec<Uuid> = rows.iter().map(|row| row.employee_id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn monthly_breakdown_rejects_impossible_months() {
    let h = Harness::new(1_000, 1_000).await;

    for month in [0, 13] {
        let err = h.service.monthly_breakdown(2024, month).await.unwrap_err();
        assert!(matches!(err, ClaimError::Validation(_)));
    }
    assert!(h.service.monthly_breakdown(2024, 12).await.unwrap().is_empty());
}

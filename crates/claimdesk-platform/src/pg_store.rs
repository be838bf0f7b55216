use async_trait::async_trait;
use claimdesk_core::{
    ApprovedClaim, ApprovedQuery, Category, Claim, ClaimApproval, ClaimError, ClaimFilter,
    ClaimImage, ClaimStatus, ClaimStore, ClaimTx, CreditAccount, PerceptualHash, storage_error,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

/// Postgres-backed claim store. Each `begin` opens a database transaction.
#[derive(Clone)]
pub struct PgClaimStore {
    pool: PgPool,
}

impl PgClaimStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    type Tx = PgClaimTx;

    async fn begin(&self) -> Result<Self::Tx, ClaimError> {
        let tx = self.pool.begin().await.map_err(storage_error)?;
        Ok(PgClaimTx { tx })
    }
}

pub struct PgClaimTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ClaimTx for PgClaimTx {
    async fn read_account(
        &mut self,
        employee_id: Uuid,
        category: Category,
    ) -> Result<Option<CreditAccount>, ClaimError> {
        let row = sqlx::query(
            r#"
            SELECT credit_limit, balance
            FROM credit_accounts
            WHERE employee_id = $1 AND category = $2
            FOR UPDATE
            "#,
        )
        .bind(employee_id)
        .bind(category.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CreditAccount {
            employee_id,
            category,
            limit: row.try_get("credit_limit").map_err(storage_error)?,
            balance: row.try_get("balance").map_err(storage_error)?,
        }))
    }

    async fn write_account(&mut self, account: &CreditAccount) -> Result<(), ClaimError> {
        sqlx::query(
            r#"
            INSERT INTO credit_accounts (employee_id, category, credit_limit, balance, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (employee_id, category)
            DO UPDATE SET
                credit_limit = EXCLUDED.credit_limit,
                balance = EXCLUDED.balance,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.employee_id)
        .bind(account.category.as_str())
        .bind(account.limit)
        .bind(account.balance)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn read_claim(&mut self, claim_id: Uuid) -> Result<Option<Claim>, ClaimError> {
        let row = sqlx::query(
            r#"
            SELECT id, employee_id, category, amount, status, request_date, message
            FROM claims
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(claim_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(claim_from_row).transpose()
    }

    async fn insert_claim(&mut self, claim: &Claim) -> Result<(), ClaimError> {
        sqlx::query(
            r#"
            INSERT INTO claims (id, employee_id, category, amount, status, request_date, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(claim.id)
        .bind(claim.employee_id)
        .bind(claim.category.as_str())
        .bind(claim.amount)
        .bind(claim.status.as_str())
        .bind(claim.request_date)
        .bind(&claim.message)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn update_claim(&mut self, claim: &Claim) -> Result<(), ClaimError> {
        let result = sqlx::query(
            r#"
            UPDATE claims
            SET amount = $2, status = $3, request_date = $4, message = $5
            WHERE id = $1
            "#,
        )
        .bind(claim.id)
        .bind(claim.amount)
        .bind(claim.status.as_str())
        .bind(claim.request_date)
        .bind(&claim.message)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(ClaimError::claim_not_found(claim.id));
        }
        Ok(())
    }

    async fn delete_claim(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM claim_images
            WHERE claim_id = $1
            RETURNING id, claim_id, storage_path, image_hash
            "#,
        )
        .bind(claim_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;
        let removed = rows
            .iter()
            .map(image_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        sqlx::query("DELETE FROM claim_approvals WHERE claim_id = $1")
            .bind(claim_id)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;
        sqlx::query("DELETE FROM claims WHERE id = $1")
            .bind(claim_id)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;

        Ok(removed)
    }

    async fn list_claims(&mut self, filter: ClaimFilter) -> Result<Vec<Claim>, ClaimError> {
        let rows = match filter {
            ClaimFilter::Employee(employee_id) => sqlx::query(
                r#"
                SELECT id, employee_id, category, amount, status, request_date, message
                FROM claims
                WHERE employee_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(employee_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage_error)?,
            ClaimFilter::Status(status) => sqlx::query(
                r#"
                SELECT id, employee_id, category, amount, status, request_date, message
                FROM claims
                WHERE status = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(status.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage_error)?,
        };

        rows.iter().map(claim_from_row).collect()
    }

    async fn list_approved(
        &mut self,
        query: ApprovedQuery,
    ) -> Result<Vec<ApprovedClaim>, ClaimError> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id,
                c.employee_id,
                c.category,
                c.amount,
                c.status,
                c.request_date,
                c.message,
                a.admin_id,
                a.approval_date,
                a.admin_message
            FROM claims c
            LEFT JOIN claim_approvals a ON a.claim_id = c.id
            WHERE c.status = $1
              AND ($2::date IS NULL OR c.request_date >= $2)
              AND ($3::date IS NULL OR c.request_date <= $3)
              AND ($4::date IS NULL OR a.approval_date = $4)
              AND ($5::uuid IS NULL OR c.employee_id = $5)
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(ClaimStatus::Approved.as_str())
        .bind(query.requested_from)
        .bind(query.requested_to)
        .bind(query.approved_on)
        .bind(query.employee_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| {
                let claim = claim_from_row(row)?;
                let admin_id: Option<Uuid> = row.try_get("admin_id").map_err(storage_error)?;
                let approval = match admin_id {
                    Some(admin_id) => Some(ClaimApproval {
                        claim_id: claim.id,
                        admin_id,
                        approval_date: row.try_get("approval_date").map_err(storage_error)?,
                        admin_message: row.try_get("admin_message").map_err(storage_error)?,
                    }),
                    None => None,
                };

                Ok(ApprovedClaim { claim, approval })
            })
            .collect()
    }

    async fn read_approval(&mut self, claim_id: Uuid) -> Result<Option<ClaimApproval>, ClaimError> {
        let row = sqlx::query(
            r#"
            SELECT admin_id, approval_date, admin_message
            FROM claim_approvals
            WHERE claim_id = $1
            "#,
        )
        .bind(claim_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ClaimApproval {
            claim_id,
            admin_id: row.try_get("admin_id").map_err(storage_error)?,
            approval_date: row.try_get("approval_date").map_err(storage_error)?,
            admin_message: row.try_get("admin_message").map_err(storage_error)?,
        }))
    }

    async fn upsert_approval(&mut self, approval: &ClaimApproval) -> Result<(), ClaimError> {
        sqlx::query(
            r#"
            INSERT INTO claim_approvals (claim_id, admin_id, approval_date, admin_message)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (claim_id)
            DO UPDATE SET
                admin_id = EXCLUDED.admin_id,
                approval_date = EXCLUDED.approval_date,
                admin_message = EXCLUDED.admin_message
            "#,
        )
        .bind(approval.claim_id)
        .bind(approval.admin_id)
        .bind(approval.approval_date)
        .bind(&approval.admin_message)
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn find_images_by_hash(
        &mut self,
        hash: PerceptualHash,
    ) -> Result<Vec<ClaimImage>, ClaimError> {
        let hash = hash.to_string();

        // Serialises duplicate checks on this hash until the transaction ends.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&hash)
            .execute(&mut *self.tx)
            .await
            .map_err(storage_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, claim_id, storage_path, image_hash
            FROM claim_images
            WHERE image_hash = $1
            ORDER BY created_at
            "#,
        )
        .bind(&hash)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        rows.iter().map(image_from_row).collect()
    }

    async fn list_images(&mut self, claim_id: Uuid) -> Result<Vec<ClaimImage>, ClaimError> {
        let rows = sqlx::query(
            r#"
            SELECT id, claim_id, storage_path, image_hash
            FROM claim_images
            WHERE claim_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(claim_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        rows.iter().map(image_from_row).collect()
    }

    async fn insert_image(&mut self, image: &ClaimImage) -> Result<(), ClaimError> {
        sqlx::query(
            r#"
            INSERT INTO claim_images (id, claim_id, storage_path, image_hash)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(image.id)
        .bind(image.claim_id)
        .bind(&image.storage_path)
        .bind(image.hash.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn commit(self) -> Result<(), ClaimError> {
        self.tx.commit().await.map_err(storage_error)
    }
}

fn claim_from_row(row: &PgRow) -> Result<Claim, ClaimError> {
    let category: String = row.try_get("category").map_err(storage_error)?;
    let status: String = row.try_get("status").map_err(storage_error)?;

    Ok(Claim {
        id: row.try_get("id").map_err(storage_error)?,
        employee_id: row.try_get("employee_id").map_err(storage_error)?,
        category: category.parse()?,
        amount: row.try_get("amount").map_err(storage_error)?,
        status: status.parse::<ClaimStatus>().map_err(storage_error)?,
        request_date: row.try_get("request_date").map_err(storage_error)?,
        message: row.try_get("message").map_err(storage_error)?,
    })
}

fn image_from_row(row: &PgRow) -> Result<ClaimImage, ClaimError> {
    let hash: String = row.try_get("image_hash").map_err(storage_error)?;

    Ok(ClaimImage {
        id: row.try_get("id").map_err(storage_error)?,
        claim_id: row.try_get("claim_id").map_err(storage_error)?,
        storage_path: row.try_get("storage_path").map_err(storage_error)?,
        hash: hash.parse::<PerceptualHash>().map_err(storage_error)?,
    })
}

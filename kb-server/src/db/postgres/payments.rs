use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Member, Payment};
use sqlx::PgConnection;

use super::PgStore;
use super::members::update_in as update_member_in;
use super::rows::{PaymentRow, map_rows};
use crate::db::{DEFAULT_PAGE_SIZE, PaymentQuery, PaymentRepository, RepoError, RepoResult};

async fn update_in(conn: &mut PgConnection, p: &Payment) -> RepoResult<()> {
    let result = sqlx::query(
        "UPDATE payments SET status = $2, notes = $3, updated_at = $4 WHERE payment_id = $1",
    )
    .bind(&p.payment_id)
    .bind(p.status.as_str())
    .bind(&p.notes)
    .bind(p.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("payment {}", p.payment_id)));
    }
    Ok(())
}

#[async_trait]
impl PaymentRepository for PgStore {
    async fn find_payment(&self, payment_id: &str) -> RepoResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as("SELECT * FROM payments WHERE payment_id = $1")
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments(&self, query: &PaymentQuery) -> RepoResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT * FROM payments
             WHERE ($1::text IS NULL OR member_id = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY payment_date DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(query.member_id.as_deref())
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .bind(query.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn recent_payments(
        &self,
        member_id: &str,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT * FROM payments
             WHERE member_id = $1 AND created_at >= $2
             ORDER BY created_at DESC",
        )
        .bind(member_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn record_payment(&self, p: &Payment, member: &mut Member) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO payments (
                payment_id, member_id, amount, payment_method, payment_type, status,
                payment_date, notes, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&p.payment_id)
        .bind(&p.member_id)
        .bind(p.amount)
        .bind(p.payment_method.as_str())
        .bind(p.payment_type.as_str())
        .bind(p.status.as_str())
        .bind(p.payment_date)
        .bind(&p.notes)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await?;

        update_member_in(&mut tx, member).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_payment(
        &self,
        payment: &Payment,
        member: Option<&mut Member>,
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        update_in(&mut tx, payment).await?;
        if let Some(member) = member {
            update_member_in(&mut tx, member).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_payment(
        &self,
        payment_id: &str,
        member: Option<&mut Member>,
    ) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;
        if let Some(member) = member {
            update_member_in(&mut tx, member).await?;
        }
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

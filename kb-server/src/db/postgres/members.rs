use async_trait::async_trait;
use shared::models::{Member, MemberStatus, NewNotification, Notification};
use sqlx::PgConnection;
use sqlx::types::Json;

use super::PgStore;
use super::notifications::find_or_create_in;
use super::rows::{MemberRow, map_rows};
use crate::db::{DEFAULT_PAGE_SIZE, MemberQuery, MemberRepository, RepoError, RepoResult};

pub(super) async fn insert_in(conn: &mut PgConnection, m: &Member) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO members (
            member_id, name, email, phone, address, gender, date_of_birth,
            membership_type, membership_duration, start_date, end_date, member_status,
            payments, renewal_history, last_payment_date,
            payment_reminder_count, payment_reminder_window, expiry_reminder_count,
            cancellation_reason, cancellation_date, expiry_date, created_at, updated_at,
            version
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                   $16, $17, $18, $19, $20, $21, $22, $23, $24)",
    )
    .bind(&m.member_id)
    .bind(&m.name)
    .bind(&m.email)
    .bind(&m.phone)
    .bind(&m.address)
    .bind(&m.gender)
    .bind(m.date_of_birth)
    .bind(m.membership_type.as_str())
    .bind(m.membership_duration as i32)
    .bind(m.start_date)
    .bind(m.end_date)
    .bind(m.member_status.as_str())
    .bind(Json(&m.payments))
    .bind(Json(&m.renewal_history))
    .bind(m.last_payment_date)
    .bind(m.payment_reminder_count)
    .bind(m.payment_reminder_window)
    .bind(m.expiry_reminder_count)
    .bind(&m.cancellation_reason)
    .bind(m.cancellation_date)
    .bind(m.expiry_date)
    .bind(m.created_at)
    .bind(m.updated_at)
    .bind(m.version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Versioned full-row update; bumps `m.version` once the row is written
pub(super) async fn update_in(conn: &mut PgConnection, m: &mut Member) -> RepoResult<()> {
    let result = sqlx::query(
        "UPDATE members SET
            name = $2, email = $3, phone = $4, address = $5, gender = $6, date_of_birth = $7,
            membership_type = $8, membership_duration = $9, start_date = $10, end_date = $11,
            member_status = $12, payments = $13, renewal_history = $14, last_payment_date = $15,
            payment_reminder_count = $16, payment_reminder_window = $17,
            expiry_reminder_count = $18, cancellation_reason = $19, cancellation_date = $20,
            expiry_date = $21, updated_at = $22, version = version + 1
         WHERE member_id = $1 AND version = $23",
    )
    .bind(&m.member_id)
    .bind(&m.name)
    .bind(&m.email)
    .bind(&m.phone)
    .bind(&m.address)
    .bind(&m.gender)
    .bind(m.date_of_birth)
    .bind(m.membership_type.as_str())
    .bind(m.membership_duration as i32)
    .bind(m.start_date)
    .bind(m.end_date)
    .bind(m.member_status.as_str())
    .bind(Json(&m.payments))
    .bind(Json(&m.renewal_history))
    .bind(m.last_payment_date)
    .bind(m.payment_reminder_count)
    .bind(m.payment_reminder_window)
    .bind(m.expiry_reminder_count)
    .bind(&m.cancellation_reason)
    .bind(m.cancellation_date)
    .bind(m.expiry_date)
    .bind(m.updated_at)
    .bind(m.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT version FROM members WHERE member_id = $1")
                .bind(&m.member_id)
                .fetch_optional(&mut *conn)
                .await?;
        return Err(match exists {
            Some(stored) => RepoError::Conflict(format!(
                "member {} is at version {stored}, write was based on {}",
                m.member_id, m.version
            )),
            None => RepoError::NotFound(format!("member {}", m.member_id)),
        });
    }
    m.version += 1;
    Ok(())
}

#[async_trait]
impl MemberRepository for PgStore {
    async fn find_member(&self, member_id: &str) -> RepoResult<Option<Member>> {
        let row: Option<MemberRow> = sqlx::query_as("SELECT * FROM members WHERE member_id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Member::try_from).transpose()
    }

    async fn find_member_by_email(&self, email: &str) -> RepoResult<Option<Member>> {
        let row: Option<MemberRow> =
            sqlx::query_as("SELECT * FROM members WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Member::try_from).transpose()
    }

    async fn list_members(&self, query: &MemberQuery) -> RepoResult<Vec<Member>> {
        let search = query.search.as_deref().map(|s| format!("%{}%", s.to_lowercase()));
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT * FROM members
             WHERE ($1::text IS NULL OR member_status = $1)
               AND ($2::text IS NULL OR membership_type = $2)
               AND ($3::text IS NULL
                    OR lower(name) LIKE $3 OR lower(email) LIKE $3 OR lower(member_id) LIKE $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5",
        )
        .bind(query.status.map(MemberStatus::as_str))
        .bind(query.membership_type.map(|t| t.as_str()))
        .bind(search)
        .bind(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .bind(query.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn members_with_status(&self, statuses: &[MemberStatus]) -> RepoResult<Vec<Member>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT * FROM members WHERE member_status = ANY($1) ORDER BY end_date ASC",
        )
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn insert_member(&self, member: &Member) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_in(&mut conn, member).await
    }

    async fn update_member(&self, member: &mut Member) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_in(&mut conn, member).await
    }

    async fn update_member_with_notification(
        &self,
        member: &mut Member,
        notification: NewNotification,
    ) -> RepoResult<Notification> {
        let mut tx = self.pool.begin().await?;
        update_in(&mut tx, member).await?;
        let (stored, _) = find_or_create_in(&mut tx, notification, member.updated_at).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_member(&self, member_id: &str) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM payments WHERE member_id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM members WHERE member_id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

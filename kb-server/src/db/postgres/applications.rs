use async_trait::async_trait;
use shared::models::{Application, ApplicationHistory, Member, NewNotification, Notification};
use sqlx::PgConnection;

use super::PgStore;
use super::notifications::find_or_create_in;
use super::rows::{ApplicationHistoryRow, ApplicationRow, map_rows};
use crate::db::{
    ApplicationQuery, ApplicationRepository, DEFAULT_PAGE_SIZE, RepoError, RepoResult,
};

async fn update_in(conn: &mut PgConnection, a: &Application) -> RepoResult<()> {
    let result = sqlx::query(
        "UPDATE applications SET
            application_status = $2, rejection_reason = $3, updated_at = $4
         WHERE application_id = $1",
    )
    .bind(&a.application_id)
    .bind(a.application_status.as_str())
    .bind(&a.rejection_reason)
    .bind(a.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("application {}", a.application_id)));
    }
    Ok(())
}

#[async_trait]
impl ApplicationRepository for PgStore {
    async fn find_application(&self, application_id: &str) -> RepoResult<Option<Application>> {
        let row: Option<ApplicationRow> =
            sqlx::query_as("SELECT * FROM applications WHERE application_id = $1")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Application::try_from).transpose()
    }

    async fn find_pending_application_by_email(
        &self,
        email: &str,
    ) -> RepoResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            "SELECT * FROM applications
             WHERE lower(email) = lower($1) AND application_status = 'pending'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn list_applications(&self, query: &ApplicationQuery) -> RepoResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            "SELECT * FROM applications
             WHERE ($1::text IS NULL OR application_status = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .bind(query.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn insert_application(&self, a: &Application) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO applications (
                application_id, name, email, phone, address, gender, date_of_birth,
                membership_type, membership_duration, start_date, application_status,
                rejection_reason, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(&a.application_id)
        .bind(&a.name)
        .bind(&a.email)
        .bind(&a.phone)
        .bind(&a.address)
        .bind(&a.gender)
        .bind(a.date_of_birth)
        .bind(a.membership_type.as_str())
        .bind(a.membership_duration as i32)
        .bind(a.start_date)
        .bind(a.application_status.as_str())
        .bind(&a.rejection_reason)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&mut *tx)
        .await?;

        let h = a.history_entry();
        sqlx::query(
            "INSERT INTO application_history (
                application_id, name, email, phone, membership_type, membership_duration,
                start_date, submitted_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&h.application_id)
        .bind(&h.name)
        .bind(&h.email)
        .bind(&h.phone)
        .bind(h.membership_type.as_str())
        .bind(h.membership_duration as i32)
        .bind(h.start_date)
        .bind(h.submitted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_application(&self, application: &Application) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_in(&mut conn, application).await
    }

    async fn accept_application(
        &self,
        application: &Application,
        member: &Member,
        notification: NewNotification,
    ) -> RepoResult<Notification> {
        let mut tx = self.pool.begin().await?;
        super::members::insert_in(&mut tx, member).await?;
        update_in(&mut tx, application).await?;
        let (stored, _) = find_or_create_in(&mut tx, notification, member.created_at).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn delete_application(&self, application_id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM applications WHERE application_id = $1")
            .bind(application_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn application_history(&self, email: &str) -> RepoResult<Vec<ApplicationHistory>> {
        let rows: Vec<ApplicationHistoryRow> = sqlx::query_as(
            "SELECT * FROM application_history
             WHERE lower(email) = lower($1)
             ORDER BY submitted_at DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }
}

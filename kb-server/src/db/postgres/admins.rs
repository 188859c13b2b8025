use async_trait::async_trait;
use chrono::Utc;

use super::PgStore;
use super::rows::AdminRow;
use crate::db::{Admin, AdminRepository, RepoResult};

#[async_trait]
impl AdminRepository for PgStore {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>> {
        let row: Option<AdminRow> =
            sqlx::query_as("SELECT * FROM admins WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Admin::from))
    }

    async fn upsert_admin(&self, email: &str, hashed_password: &str) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO admins (email, hashed_password, created_at) VALUES ($1, $2, $3)
             ON CONFLICT (email) DO UPDATE SET hashed_password = EXCLUDED.hashed_password",
        )
        .bind(email)
        .bind(hashed_password)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

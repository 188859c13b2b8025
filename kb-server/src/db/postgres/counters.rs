use async_trait::async_trait;

use super::PgStore;
use crate::db::{CounterRepository, RepoResult};

#[async_trait]
impl CounterRepository for PgStore {
    async fn next_value(&self, name: &str) -> RepoResult<i64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO counters (name, value) VALUES ($1, 1)
             ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
             RETURNING value",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}

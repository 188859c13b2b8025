//! PostgreSQL implementation of the repository traits
//!
//! Compound writes open a transaction with `pool.begin()`, bind every
//! statement to `&mut *tx` and commit at the end; returning early through
//! `?` drops the transaction, which rolls it back.

mod admins;
mod applications;
mod counters;
mod members;
mod notifications;
mod payments;
mod rows;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::BoxError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

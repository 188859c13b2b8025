//! Human-readable id minting backed by the `counters` table

use std::sync::Arc;

use shared::models::IdKind;

use crate::db::Store;
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct Identifiers {
    store: Arc<dyn Store>,
}

impl Identifiers {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Increment the kind's counter and format the new value
    pub async fn next(&self, kind: IdKind) -> ServiceResult<String> {
        let value = self.store.next_value(kind.counter_name()).await?;
        Ok(kind.format(value))
    }
}

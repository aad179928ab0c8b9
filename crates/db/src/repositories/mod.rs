use thiserror::Error;

use offerdesk_core::errors::StoreError;

use crate::DbPool;

mod codec;
pub mod discount;
pub mod margin;
pub mod memory;
pub mod product;
pub mod quote;

pub use memory::InMemoryPricingStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unit of work failed and was rolled back: {0}")]
    Consistency(String),
}

impl RepositoryError {
    /// Any failure inside a transaction means nothing it wrote is visible.
    pub(crate) fn rolled_back(unit_of_work: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::Consistency(message) => RepositoryError::Consistency(message),
            other => RepositoryError::Consistency(format!("{unit_of_work}: {other}")),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::Consistency(message) => StoreError::Consistency(message),
        }
    }
}

/// SQLite adapter for every pricing port. Per-table impls live in the sibling
/// modules.
#[derive(Clone)]
pub struct SqlPricingStore {
    pool: DbPool,
}

impl SqlPricingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

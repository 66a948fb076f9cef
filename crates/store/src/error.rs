use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stock decrement would have driven a product's stock below zero.
    ///
    /// Raised at commit time inside the order transaction; the whole
    /// transaction is rolled back when this occurs.
    #[error("insufficient stock for product {product_id} at commit time")]
    StockConflict { product_id: ProductId },

    /// A row referenced by a write no longer exists.
    #[error("{entity} not found: {id}")]
    MissingRow { entity: &'static str, id: String },

    /// A stored column value could not be decoded into its domain type.
    #[error("invalid value in column {column}: {value}")]
    Decode { column: &'static str, value: String },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

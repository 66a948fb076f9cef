//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Checkout and order-access failures with a distinct variant per cause.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request carried no items.
    #[error("order must contain at least one item")]
    NoItems,

    /// A line requested a non-positive quantity.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// The delivery address does not exist or belongs to another customer.
    #[error("invalid delivery address")]
    InvalidAddress,

    /// One or more requested products do not exist or are inactive.
    #[error("one or more products not found or inactive")]
    ProductUnavailable,

    /// A line's quantity exceeds the product's available stock.
    #[error("insufficient stock for {product}")]
    InsufficientStock { product: String },

    /// The order does not exist, or the requester may not see it. The two
    /// cases are deliberately indistinguishable.
    #[error("order not found")]
    NotFound,

    /// The requester lacks the role this operation requires.
    #[error("insufficient permissions")]
    Unauthorized,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A checkout or order-access rule was violated.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The storage layer failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

//! Domain layer for the delivery platform.
//!
//! This crate provides the order engine (checkout validation, pricing, and
//! atomic commit against a [`store::Store`]) and the pure pricing
//! calculator. Authorization scoping for order reads and status updates
//! also lives here.

pub mod checkout;
pub mod engine;
pub mod error;
pub mod pricing;

pub use checkout::{ItemRequest, OrderFilter, PlaceOrder, Requester};
pub use engine::{DELIVERY_FEE, MAX_PAGE_SIZE, OrderEngine};
pub use error::{DomainError, OrderError};
pub use pricing::{OrderTotals, PriceLine, price_order};

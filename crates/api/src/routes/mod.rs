//! HTTP route handlers.

pub mod addresses;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

pub use orders::AppState;

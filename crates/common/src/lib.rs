//! Shared types for the delivery platform.
//!
//! Typed identifiers prevent mixing up the various UUID-based ids, and
//! [`Money`] keeps all amounts in integer minor units.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{AddressId, CustomerId, OrderId, ProductId, Role};

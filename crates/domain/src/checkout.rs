//! Checkout request types consumed by the order engine.
//!
//! There is deliberately no price field anywhere in these types: unit
//! prices are always taken from the server-held catalog at validation time,
//! never from the client.

use common::{AddressId, CustomerId, ProductId, Role};
use serde::Deserialize;
use store::OrderStatus;

/// The authenticated identity an operation runs as.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub customer_id: CustomerId,
    pub role: Role,
}

impl Requester {
    pub fn customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            role: Role::Customer,
        }
    }

    pub fn admin(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            role: Role::Admin,
        }
    }

    /// Returns true for admin identities.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// One requested order line.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A proposed cart to validate and commit.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub address_id: AddressId,
    #[serde(default)]
    pub delivery_notes: Option<String>,
    pub items: Vec<ItemRequest>,
}

/// Paging and status filter for order listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub page: u32,
    pub limit: u32,
    pub status: Option<OrderStatus>,
}

//! Persistent record types shared by the storage backends.

use chrono::{DateTime, Utc};
use common::{AddressId, CustomerId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product category, a closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Cigarette,
    Condom,
    Combo,
    Other,
}

impl Category {
    /// Returns the category name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cigarette => "CIGARETTE",
            Category::Condom => "CONDOM",
            Category::Combo => "COMBO",
            Category::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CIGARETTE" => Ok(Category::Cigarette),
            "CONDOM" => Ok(Category::Condom),
            "COMBO" => Ok(Category::Combo),
            "OTHER" => Ok(Category::Other),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog product.
///
/// Products are never hard-deleted; deactivation clears `is_active` and
/// removes the product from every purchasable surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: Money,
    pub stock: i32,
    pub category: Category,
    pub image_url: String,
    pub pack_size: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A delivery address owned by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub label: String,
    pub full_address: String,
    pub lat: f64,
    pub lng: f64,
    pub is_default: bool,
}

/// Order lifecycle status.
///
/// Any status may move to any other status by admin action; there is no
/// transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "OUT_FOR_DELIVERY" => Ok(OrderStatus::OutForDelivery),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub delivery_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a committed order.
///
/// `unit_price` is a snapshot of the product price at commit time and never
/// changes afterwards, even if the catalog price does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order line joined with its catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemDetails {
    pub item: OrderItem,
    pub product: Product,
}

/// A fully hydrated order: the record, its lines with products, and the
/// delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItemDetails>,
    pub address: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrip() {
        for c in [
            Category::Cigarette,
            Category::Condom,
            Category::Combo,
            Category::Other,
        ] {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("SNACK".parse::<Category>().is_err());
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn status_serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
    }
}

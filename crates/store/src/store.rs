//! Storage traits and the value types that cross them.

use async_trait::async_trait;
use common::{AddressId, CustomerId, Money, OrderId, ProductId};
use serde::Serialize;

use crate::error::Result;
use crate::records::{Address, Category, OrderDetails, OrderStatus, Product};

/// Input for creating a catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: Money,
    pub stock: i32,
    pub category: Category,
    pub image_url: String,
    pub pack_size: String,
}

/// Partial update for a catalog product; `None` fields are left unchanged.
///
/// Stock edits through this path are absolute sets, used by admin tooling
/// only; the checkout path decrements stock relatively inside its own
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i32>,
    pub category: Option<Category>,
    pub image_url: Option<String>,
    pub pack_size: Option<String>,
}

/// Catalog listing filter. All fields combine conjunctively.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub price_min: Option<Money>,
    pub price_max: Option<Money>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

/// Input for creating a delivery address.
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub customer_id: CustomerId,
    pub label: String,
    pub full_address: String,
    pub lat: f64,
    pub lng: f64,
    pub is_default: bool,
}

/// One line of an order to commit. `unit_price` is the server-held product
/// price captured by the engine at validation time.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A validated, priced order ready for atomic commit.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub address_id: AddressId,
    pub total_amount: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub delivery_notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// Order listing scope and filter, already authorization-resolved by the
/// caller: `customer` is `Some` when results must be limited to one owner.
#[derive(Debug, Clone, Default)]
pub struct OrderListQuery {
    pub customer: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub limit: u32,
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Number of pages the full result set spans.
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Catalog persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Batch lookup restricted to active products. Callers compare the
    /// result size against the requested distinct id count to detect
    /// missing or deactivated products.
    async fn find_active_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Looks up a single product by id, active or not.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Paginated, filtered listing of active products, newest first.
    async fn list_products(&self, filter: ProductFilter) -> Result<Page<Product>>;

    async fn create_product(&self, new: NewProduct) -> Result<Product>;

    /// Applies a partial update; returns `None` if the product is unknown.
    async fn update_product(&self, id: ProductId, update: ProductUpdate)
    -> Result<Option<Product>>;

    /// Soft delete: clears the active flag. Returns false if unknown.
    async fn deactivate_product(&self, id: ProductId) -> Result<bool>;
}

/// Delivery address persistence.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Returns the address only if it exists and belongs to `owner`.
    async fn find_owned(&self, id: AddressId, owner: CustomerId) -> Result<Option<Address>>;

    /// Creates an address. When `is_default` is set, the owner's previous
    /// default is unset in the same atomic unit.
    async fn create_address(&self, new: NewAddress) -> Result<Address>;

    /// All addresses of one owner, default first.
    async fn list_addresses(&self, owner: CustomerId) -> Result<Vec<Address>>;

    /// Deletes the address if owned by `owner` and not referenced by any
    /// order; returns false otherwise.
    async fn delete_owned(&self, id: AddressId, owner: CustomerId) -> Result<bool>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically commits an order: decrements every product's stock by the
    /// ordered quantity and inserts the order with its lines, all in one
    /// transaction. A decrement that would cross zero aborts the whole
    /// commit with [`crate::StoreError::StockConflict`] and leaves no
    /// visible side effect.
    async fn create_order(&self, new: NewOrder) -> Result<OrderDetails>;

    /// Loads a hydrated order. Authorization is the caller's concern.
    async fn find_order(&self, id: OrderId) -> Result<Option<OrderDetails>>;

    /// Pages through orders matching the query, newest first.
    async fn list_orders(&self, query: OrderListQuery) -> Result<Page<OrderDetails>>;

    /// Sets the order status; returns `None` if the order is unknown.
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<OrderDetails>>;
}

/// Umbrella trait for a backend providing all three stores.
pub trait Store: CatalogStore + AddressStore + OrderStore {}

impl<T: CatalogStore + AddressStore + OrderStore> Store for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_totals() {
        let page = Page::<u8> {
            items: vec![],
            total: 101,
            page: 1,
            limit: 50,
        };
        assert_eq!(page.total_pages(), 3);

        let exact = Page::<u8> {
            items: vec![],
            total: 100,
            page: 1,
            limit: 50,
        };
        assert_eq!(exact.total_pages(), 2);

        let empty = Page::<u8> {
            items: vec![],
            total: 0,
            page: 1,
            limit: 50,
        };
        assert_eq!(empty.total_pages(), 0);
    }
}

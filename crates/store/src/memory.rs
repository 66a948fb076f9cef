use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AddressId, CustomerId, OrderId, ProductId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Address, NewAddress, NewOrder, NewProduct, Order, OrderDetails, OrderItem, OrderItemDetails,
    OrderListQuery, OrderStatus, Page, Product, ProductFilter, ProductUpdate, Result, StoreError,
    store::{AddressStore, CatalogStore, OrderStore},
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    addresses: HashMap<AddressId, Address>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
}

impl State {
    fn hydrate(&self, order: &Order) -> Result<OrderDetails> {
        let address = self
            .addresses
            .get(&order.address_id)
            .cloned()
            .ok_or_else(|| StoreError::MissingRow {
                entity: "address",
                id: order.address_id.to_string(),
            })?;

        let mut lines = Vec::new();
        for item in self.items.get(&order.id).cloned().unwrap_or_default() {
            let product = self
                .products
                .get(&item.product_id)
                .cloned()
                .ok_or_else(|| StoreError::MissingRow {
                    entity: "product",
                    id: item.product_id.to_string(),
                })?;
            lines.push(OrderItemDetails { item, product });
        }

        Ok(OrderDetails {
            order: order.clone(),
            items: lines,
            address,
        })
    }
}

/// In-memory store implementation for testing.
///
/// Provides the same interface and atomicity guarantees as the PostgreSQL
/// implementation: the order commit holds the single state lock for its
/// whole check-and-apply sequence, so concurrent checkouts observe
/// all-or-nothing effects.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        self.state.read().await.products.get(&id).map(|p| p.stock)
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_active_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Page<Product>> {
        let state = self.state.read().await;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());

        let mut matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_active)
            .filter(|p| filter.category.is_none_or(|c| p.category == c))
            .filter(|p| filter.brand.as_ref().is_none_or(|b| &p.brand == b))
            .filter(|p| filter.price_min.is_none_or(|m| p.price >= m))
            .filter(|p| filter.price_max.is_none_or(|m| p.price <= m))
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n)
                        || p.brand.to_lowercase().contains(n)
                        || p.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len() as u64;
        let offset = filter.page.saturating_sub(1) as usize * filter.limit as usize;
        let items = matches
            .into_iter()
            .skip(offset)
            .take(filter.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            name: new.name,
            brand: new.brand,
            description: new.description,
            price: new.price,
            stock: new.stock,
            category: new.category,
            image_url: new.image_url,
            pack_size: new.pack_size,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let mut state = self.state.write().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(brand) = update.brand {
            product.brand = brand;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        if let Some(category) = update.category {
            product.category = category;
        }
        if let Some(image_url) = update.image_url {
            product.image_url = image_url;
        }
        if let Some(pack_size) = update.pack_size {
            product.pack_size = pack_size;
        }
        product.updated_at = Utc::now();

        Ok(Some(product.clone()))
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(false);
        };
        product.is_active = false;
        product.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl AddressStore for InMemoryStore {
    async fn find_owned(&self, id: AddressId, owner: CustomerId) -> Result<Option<Address>> {
        Ok(self
            .state
            .read()
            .await
            .addresses
            .get(&id)
            .filter(|a| a.customer_id == owner)
            .cloned())
    }

    async fn create_address(&self, new: NewAddress) -> Result<Address> {
        let mut state = self.state.write().await;

        if new.is_default {
            for address in state.addresses.values_mut() {
                if address.customer_id == new.customer_id {
                    address.is_default = false;
                }
            }
        }

        let address = Address {
            id: AddressId::new(),
            customer_id: new.customer_id,
            label: new.label,
            full_address: new.full_address,
            lat: new.lat,
            lng: new.lng,
            is_default: new.is_default,
        };
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn list_addresses(&self, owner: CustomerId) -> Result<Vec<Address>> {
        let state = self.state.read().await;
        let mut addresses: Vec<Address> = state
            .addresses
            .values()
            .filter(|a| a.customer_id == owner)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default));
        Ok(addresses)
    }

    async fn delete_owned(&self, id: AddressId, owner: CustomerId) -> Result<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .addresses
            .get(&id)
            .is_some_and(|a| a.customer_id == owner);
        // Committed orders reference their address by id; it must stay
        // resolvable for as long as any order points at it.
        let referenced = state.orders.values().any(|o| o.address_id == id);
        if owned && !referenced {
            state.addresses.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, new: NewOrder) -> Result<OrderDetails> {
        let mut state = self.state.write().await;

        // Re-validate sufficiency under the same lock that applies the
        // decrement. Quantities are accumulated per product so duplicate
        // lines cannot slip past the check.
        let mut needed: HashMap<ProductId, i64> = HashMap::new();
        for item in &new.items {
            *needed.entry(item.product_id).or_default() += i64::from(item.quantity);
        }
        for (product_id, quantity) in &needed {
            let product =
                state
                    .products
                    .get(product_id)
                    .ok_or_else(|| StoreError::MissingRow {
                        entity: "product",
                        id: product_id.to_string(),
                    })?;
            if i64::from(product.stock) < *quantity {
                return Err(StoreError::StockConflict {
                    product_id: *product_id,
                });
            }
        }

        let now = Utc::now();
        for (product_id, quantity) in &needed {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= *quantity as i32;
                product.updated_at = now;
            }
        }

        let order = Order {
            id: OrderId::new(),
            customer_id: new.customer_id,
            address_id: new.address_id,
            status: OrderStatus::Pending,
            total_amount: new.total_amount,
            delivery_fee: new.delivery_fee,
            discount: new.discount,
            delivery_notes: new.delivery_notes,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = new
            .items
            .iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        state.orders.insert(order.id, order.clone());
        state.items.insert(order.id, items);

        state.hydrate(&order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let state = self.state.read().await;
        state
            .orders
            .get(&id)
            .map(|order| state.hydrate(order))
            .transpose()
    }

    async fn list_orders(&self, query: OrderListQuery) -> Result<Page<OrderDetails>> {
        let state = self.state.read().await;
        let mut matches: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| query.customer.is_none_or(|c| o.customer_id == c))
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len() as u64;
        let offset = query.page.saturating_sub(1) as usize * query.limit as usize;
        let items: Result<Vec<OrderDetails>> = matches
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|order| state.hydrate(order))
            .collect();

        Ok(Page {
            items: items?,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<OrderDetails>> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Utc::now();
        let order = order.clone();
        state.hydrate(&order).map(Some)
    }
}

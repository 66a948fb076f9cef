//! Persistence layer for the delivery platform.
//!
//! Record types, the [`CatalogStore`]/[`AddressStore`]/[`OrderStore`]
//! traits, and two backends: [`PostgresStore`] for production and
//! [`InMemoryStore`] for tests. The transactional order commit (conditional
//! stock decrements plus order/item inserts as a single unit) lives behind
//! [`OrderStore::create_order`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    Address, Category, Order, OrderDetails, OrderItem, OrderItemDetails, OrderStatus, Product,
};
pub use store::{
    AddressStore, CatalogStore, NewAddress, NewOrder, NewOrderItem, NewProduct, OrderListQuery,
    OrderStore, Page, ProductFilter, ProductUpdate, Store,
};

//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency. Each test
//! truncates the tables, so they are serialized with `#[serial]`.
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{CustomerId, Money, ProductId};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    AddressStore, CatalogStore, Category, NewAddress, NewOrder, NewOrderItem, NewProduct,
    OrderListQuery, OrderStatus, OrderStore, PostgresStore, ProductFilter, ProductUpdate,
    StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Run migrations once against a temporary pool
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, addresses, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn new_product(name: &str, price_minor: i64, stock: i32, category: Category) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        brand: "Acme".to_string(),
        description: format!("{name} description"),
        price: Money::from_minor(price_minor),
        stock,
        category,
        image_url: String::new(),
        pack_size: "1".to_string(),
    }
}

fn new_address(owner: CustomerId, label: &str, is_default: bool) -> NewAddress {
    NewAddress {
        customer_id: owner,
        label: label.to_string(),
        full_address: "12 Long Street, Springfield".to_string(),
        lat: 1.3,
        lng: 103.8,
        is_default,
    }
}

fn order_of(
    customer: CustomerId,
    address: common::AddressId,
    items: Vec<(ProductId, u32, i64)>,
) -> NewOrder {
    let subtotal: i64 = items.iter().map(|(_, q, p)| i64::from(*q) * p).sum();
    let delivery_fee = Money::from_units(50);
    NewOrder {
        customer_id: customer,
        address_id: address,
        total_amount: Money::from_minor(subtotal) + delivery_fee,
        delivery_fee,
        discount: Money::zero(),
        delivery_notes: None,
        items: items
            .into_iter()
            .map(|(product_id, quantity, unit_price)| NewOrderItem {
                product_id,
                quantity,
                unit_price: Money::from_minor(unit_price),
            })
            .collect(),
    }
}

async fn stock_of(store: &PostgresStore, id: ProductId) -> i32 {
    store.find_product(id).await.unwrap().unwrap().stock
}

#[tokio::test]
#[serial]
async fn product_crud_roundtrip() {
    let store = get_test_store().await;

    let product = store
        .create_product(new_product("Lager", 10_000, 24, Category::Other))
        .await
        .unwrap();
    assert!(product.is_active);
    assert_eq!(product.price, Money::from_minor(10_000));

    let updated = store
        .update_product(
            product.id,
            ProductUpdate {
                price: Some(Money::from_minor(12_000)),
                stock: Some(10),
                ..ProductUpdate::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.price, Money::from_minor(12_000));
    assert_eq!(updated.stock, 10);
    assert_eq!(updated.name, "Lager");

    assert!(store.deactivate_product(product.id).await.unwrap());
    let fetched = store.find_product(product.id).await.unwrap().unwrap();
    assert!(!fetched.is_active);

    // Deactivated products are invisible to checkout lookups.
    let active = store.find_active_by_ids(&[product.id]).await.unwrap();
    assert!(active.is_empty());

    // Unknown ids update nothing.
    let missing = store
        .update_product(ProductId::new(), ProductUpdate::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[serial]
async fn product_listing_filters_and_pages() {
    let store = get_test_store().await;

    for i in 0..5 {
        store
            .create_product(new_product(
                &format!("Smoke {i}"),
                5_000 + i * 1_000,
                10,
                Category::Cigarette,
            ))
            .await
            .unwrap();
    }
    store
        .create_product(new_product("Bundle", 30_000, 10, Category::Combo))
        .await
        .unwrap();
    let hidden = store
        .create_product(new_product("Retired", 1_000, 10, Category::Cigarette))
        .await
        .unwrap();
    store.deactivate_product(hidden.id).await.unwrap();

    let page = store
        .list_products(ProductFilter {
            category: Some(Category::Cigarette),
            page: 1,
            limit: 2,
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 3);

    let page = store
        .list_products(ProductFilter {
            price_min: Some(Money::from_minor(6_000)),
            price_max: Some(Money::from_minor(8_000)),
            page: 1,
            limit: 50,
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    let prices: Vec<i64> = page.items.iter().map(|p| p.price.minor()).collect();
    assert!(prices.iter().all(|p| (6_000..=8_000).contains(p)));
    assert_eq!(page.total, 3);

    let page = store
        .list_products(ProductFilter {
            search: Some("bund".to_string()),
            page: 1,
            limit: 50,
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "Bundle");
}

#[tokio::test]
#[serial]
async fn default_address_is_exclusive_per_customer() {
    let store = get_test_store().await;
    let alice = CustomerId::new();
    let bob = CustomerId::new();

    let home = store
        .create_address(new_address(alice, "Home", true))
        .await
        .unwrap();
    let bob_home = store
        .create_address(new_address(bob, "Home", true))
        .await
        .unwrap();
    let office = store
        .create_address(new_address(alice, "Office", true))
        .await
        .unwrap();

    let addresses = store.list_addresses(alice).await.unwrap();
    assert_eq!(addresses.len(), 2);
    let defaults: Vec<_> = addresses.iter().filter(|a| a.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, office.id);

    // Another customer's default is untouched.
    let bob_addresses = store.list_addresses(bob).await.unwrap();
    assert!(bob_addresses.iter().any(|a| a.id == bob_home.id && a.is_default));

    // Ownership is enforced on lookup and delete.
    assert!(store.find_owned(home.id, bob).await.unwrap().is_none());
    assert!(!store.delete_owned(home.id, bob).await.unwrap());
    assert!(store.delete_owned(home.id, alice).await.unwrap());
    assert_eq!(store.list_addresses(alice).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn create_order_persists_details_and_decrements_stock() {
    let store = get_test_store().await;
    let customer = CustomerId::new();

    let beer = store
        .create_product(new_product("Beer", 10_000, 10, Category::Other))
        .await
        .unwrap();
    let chips = store
        .create_product(new_product("Chips", 5_000, 10, Category::Other))
        .await
        .unwrap();
    let address = store
        .create_address(new_address(customer, "Home", true))
        .await
        .unwrap();

    let details = store
        .create_order(order_of(
            customer,
            address.id,
            vec![(beer.id, 2, 10_000), (chips.id, 1, 5_000)],
        ))
        .await
        .unwrap();

    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.total_amount, Money::from_minor(30_000));
    assert_eq!(details.items.len(), 2);
    // Line order is stable.
    assert_eq!(details.items[0].item.product_id, beer.id);
    assert_eq!(details.items[0].item.quantity, 2);
    assert_eq!(details.items[1].item.product_id, chips.id);
    assert_eq!(details.address.id, address.id);

    assert_eq!(stock_of(&store, beer.id).await, 8);
    assert_eq!(stock_of(&store, chips.id).await, 9);

    let found = store.find_order(details.order.id).await.unwrap().unwrap();
    assert_eq!(found.order.id, details.order.id);
    assert_eq!(found.items.len(), 2);

    // The delivery address is now pinned by the order.
    assert!(!store.delete_owned(address.id, customer).await.unwrap());
}

#[tokio::test]
#[serial]
async fn failed_order_rolls_back_every_decrement() {
    let store = get_test_store().await;
    let customer = CustomerId::new();

    let beer = store
        .create_product(new_product("Beer", 10_000, 10, Category::Other))
        .await
        .unwrap();
    let scarce = store
        .create_product(new_product("Scarce", 5_000, 1, Category::Other))
        .await
        .unwrap();
    let address = store
        .create_address(new_address(customer, "Home", true))
        .await
        .unwrap();

    // First line would succeed on its own; second exceeds stock.
    let err = store
        .create_order(order_of(
            customer,
            address.id,
            vec![(beer.id, 2, 10_000), (scarce.id, 2, 5_000)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::StockConflict { product_id } if product_id == scarce.id
    ));

    // The whole transaction rolled back.
    assert_eq!(stock_of(&store, beer.id).await, 10);
    assert_eq!(stock_of(&store, scarce.id).await, 1);
    let page = store
        .list_orders(OrderListQuery {
            customer: Some(customer),
            status: None,
            page: 1,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn concurrent_orders_never_oversell() {
    let store = get_test_store().await;
    let customer = CustomerId::new();

    let beer = store
        .create_product(new_product("Beer", 10_000, 5, Category::Other))
        .await
        .unwrap();
    let address = store
        .create_address(new_address(customer, "Home", true))
        .await
        .unwrap();

    let a = {
        let store = store.clone();
        let order = order_of(customer, address.id, vec![(beer.id, 3, 10_000)]);
        tokio::spawn(async move { store.create_order(order).await })
    };
    let b = {
        let store = store.clone();
        let order = order_of(customer, address.id, vec![(beer.id, 3, 10_000)]);
        tokio::spawn(async move { store.create_order(order).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(StoreError::StockConflict { product_id }) if *product_id == beer.id
    )));

    // Stock floor held: 5 - 3, never negative.
    assert_eq!(stock_of(&store, beer.id).await, 2);
}

#[tokio::test]
#[serial]
async fn order_listing_filters_by_customer_and_status() {
    let store = get_test_store().await;
    let alice = CustomerId::new();
    let bob = CustomerId::new();

    let beer = store
        .create_product(new_product("Beer", 10_000, 100, Category::Other))
        .await
        .unwrap();
    let alice_addr = store
        .create_address(new_address(alice, "Home", true))
        .await
        .unwrap();
    let bob_addr = store
        .create_address(new_address(bob, "Home", true))
        .await
        .unwrap();

    let first = store
        .create_order(order_of(alice, alice_addr.id, vec![(beer.id, 1, 10_000)]))
        .await
        .unwrap();
    store
        .create_order(order_of(alice, alice_addr.id, vec![(beer.id, 1, 10_000)]))
        .await
        .unwrap();
    store
        .create_order(order_of(bob, bob_addr.id, vec![(beer.id, 1, 10_000)]))
        .await
        .unwrap();

    let shipped = store
        .set_status(first.order.id, OrderStatus::Delivered)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipped.order.status, OrderStatus::Delivered);

    let page = store
        .list_orders(OrderListQuery {
            customer: Some(alice),
            status: None,
            page: 1,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|d| d.order.customer_id == alice));

    let page = store
        .list_orders(OrderListQuery {
            customer: Some(alice),
            status: Some(OrderStatus::Delivered),
            page: 1,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].order.id, first.order.id);

    // Unscoped listing sees everything, newest first.
    let page = store
        .list_orders(OrderListQuery {
            customer: None,
            status: None,
            page: 1,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 2);
}

#[tokio::test]
#[serial]
async fn set_status_on_unknown_order_is_none() {
    let store = get_test_store().await;

    let result = store
        .set_status(common::OrderId::new(), OrderStatus::OutForDelivery)
        .await
        .unwrap();
    assert!(result.is_none());
}

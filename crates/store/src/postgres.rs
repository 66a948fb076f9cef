use std::collections::HashMap;

use async_trait::async_trait;
use common::{AddressId, CustomerId, Money, OrderId, ProductId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Address, Category, NewAddress, NewOrder, NewProduct, Order, OrderDetails, OrderItem,
    OrderItemDetails, OrderListQuery, OrderStatus, Page, Product, ProductFilter, ProductUpdate,
    Result, StoreError,
    store::{AddressStore, CatalogStore, OrderStore},
};

const PRODUCT_COLUMNS: &str = "id, name, brand, description, price_minor, stock, category, \
     image_url, pack_size, is_active, created_at, updated_at";

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_product_filters<'q>(mut q: PgQuery<'q>, filter: &ProductFilter) -> PgQuery<'q> {
    if let Some(category) = filter.category {
        q = q.bind(category.as_str());
    }
    if let Some(ref brand) = filter.brand {
        q = q.bind(brand.clone());
    }
    if let Some(price_min) = filter.price_min {
        q = q.bind(price_min.minor());
    }
    if let Some(price_max) = filter.price_max {
        q = q.bind(price_max.minor());
    }
    if let Some(ref search) = filter.search {
        q = q.bind(format!("%{search}%"));
    }
    q
}

fn bind_order_filters<'q>(mut q: PgQuery<'q>, query: &OrderListQuery) -> PgQuery<'q> {
    if let Some(customer) = query.customer {
        q = q.bind(customer.as_uuid());
    }
    if let Some(status) = query.status {
        q = q.bind(status.as_str());
    }
    q
}

/// PostgreSQL-backed store implementation.
///
/// Concurrent checkouts are serialized by the database: the stock decrement
/// is a conditional relative `UPDATE` that the row lock orders, and a
/// decrement that would cross zero affects no rows and aborts the commit.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        let category_raw: String = row.try_get("category")?;
        let category: Category = category_raw.parse().map_err(|()| StoreError::Decode {
            column: "category",
            value: category_raw,
        })?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            brand: row.try_get("brand")?,
            description: row.try_get("description")?,
            price: Money::from_minor(row.try_get("price_minor")?),
            stock: row.try_get("stock")?,
            category,
            image_url: row.try_get("image_url")?,
            pack_size: row.try_get("pack_size")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_address(row: &PgRow) -> Result<Address> {
        Ok(Address {
            id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            label: row.try_get("label")?,
            full_address: row.try_get("full_address")?,
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
            is_default: row.try_get("is_default")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status_raw: String = row.try_get("status")?;
        let status: OrderStatus = status_raw.parse().map_err(|()| StoreError::Decode {
            column: "status",
            value: status_raw,
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("address_id")?),
            status,
            total_amount: Money::from_minor(row.try_get("total_minor")?),
            delivery_fee: Money::from_minor(row.try_get("delivery_fee_minor")?),
            discount: Money::from_minor(row.try_get("discount_minor")?),
            delivery_notes: row.try_get("delivery_notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderItem {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: quantity as u32,
            unit_price: Money::from_minor(row.try_get("unit_price_minor")?),
        })
    }

    /// Hydrates a batch of order rows with their addresses, lines, and
    /// line products, preserving the input order.
    async fn hydrate_orders(
        conn: &mut PgConnection,
        orders: Vec<Order>,
    ) -> Result<Vec<OrderDetails>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let address_ids: Vec<Uuid> = orders.iter().map(|o| o.address_id.as_uuid()).collect();

        let address_rows = sqlx::query(
            "SELECT id, customer_id, label, full_address, lat, lng, is_default \
             FROM addresses WHERE id = ANY($1)",
        )
        .bind(&address_ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut addresses: HashMap<AddressId, Address> = HashMap::new();
        for row in &address_rows {
            let address = Self::row_to_address(row)?;
            addresses.insert(address.id, address);
        }

        let item_rows = sqlx::query(
            "SELECT id, order_id, product_id, quantity, unit_price_minor \
             FROM order_items WHERE order_id = ANY($1) ORDER BY line_no ASC",
        )
        .bind(&order_ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        let mut product_ids: Vec<Uuid> = Vec::new();
        for row in &item_rows {
            let item = Self::row_to_item(row)?;
            product_ids.push(item.product_id.as_uuid());
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        let product_rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&product_ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for row in &product_rows {
            let product = Self::row_to_product(row)?;
            products.insert(product.id, product);
        }

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let address = addresses
                .get(&order.address_id)
                .cloned()
                .ok_or_else(|| StoreError::MissingRow {
                    entity: "address",
                    id: order.address_id.to_string(),
                })?;

            let mut lines = Vec::new();
            for item in items_by_order.remove(&order.id).unwrap_or_default() {
                let product = products.get(&item.product_id).cloned().ok_or_else(|| {
                    StoreError::MissingRow {
                        entity: "product",
                        id: item.product_id.to_string(),
                    }
                })?;
                lines.push(OrderItemDetails { item, product });
            }

            details.push(OrderDetails {
                order,
                items: lines,
                address,
            });
        }

        Ok(details)
    }

    async fn load_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<OrderDetails>> {
        let row = sqlx::query(
            "SELECT id, customer_id, address_id, status, total_minor, delivery_fee_minor, \
             discount_minor, delivery_notes, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(&row)?;
        let mut hydrated = Self::hydrate_orders(conn, vec![order]).await?;
        Ok(hydrated.pop())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn find_active_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) AND is_active"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Page<Product>> {
        let mut where_sql = String::from(" WHERE is_active");
        let mut param_count = 0;

        if filter.category.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if filter.brand.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND brand = ${param_count}"));
        }
        if filter.price_min.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND price_minor >= ${param_count}"));
        }
        if filter.price_max.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND price_minor <= ${param_count}"));
        }
        if filter.search.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(
                " AND (name ILIKE ${param_count} OR brand ILIKE ${param_count} \
                 OR description ILIKE ${param_count})"
            ));
        }

        let count_sql = format!("SELECT COUNT(*) FROM products{where_sql}");
        let total: i64 = bind_product_filters(sqlx::query(&count_sql), &filter)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let offset = i64::from(filter.page.saturating_sub(1)) * i64::from(filter.limit);
        let list_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{where_sql} \
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_product_filters(sqlx::query(&list_sql), &filter)
            .bind(i64::from(filter.limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items: Result<Vec<Product>> = rows.iter().map(Self::row_to_product).collect();
        Ok(Page {
            items: items?,
            total: total as u64,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let id = ProductId::new();
        let row = sqlx::query(&format!(
            "INSERT INTO products \
             (id, name, brand, description, price_minor, stock, category, image_url, pack_size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(&new.name)
        .bind(&new.brand)
        .bind(&new.description)
        .bind(new.price.minor())
        .bind(new.stock)
        .bind(new.category.as_str())
        .bind(&new.image_url)
        .bind(&new.pack_size)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(&row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        // COALESCE keeps unspecified fields at their current value.
        let row = sqlx::query(&format!(
            "UPDATE products SET \
             name = COALESCE($2, name), \
             brand = COALESCE($3, brand), \
             description = COALESCE($4, description), \
             price_minor = COALESCE($5, price_minor), \
             stock = COALESCE($6, stock), \
             category = COALESCE($7, category), \
             image_url = COALESCE($8, image_url), \
             pack_size = COALESCE($9, pack_size), \
             updated_at = now() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(update.name)
        .bind(update.brand)
        .bind(update.description)
        .bind(update.price.map(|p| p.minor()))
        .bind(update.stock)
        .bind(update.category.map(|c| c.as_str()))
        .bind(update.image_url)
        .bind(update.pack_size)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AddressStore for PostgresStore {
    async fn find_owned(&self, id: AddressId, owner: CustomerId) -> Result<Option<Address>> {
        let row = sqlx::query(
            "SELECT id, customer_id, label, full_address, lat, lng, is_default \
             FROM addresses WHERE id = $1 AND customer_id = $2",
        )
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_address).transpose()
    }

    async fn create_address(&self, new: NewAddress) -> Result<Address> {
        let mut tx = self.pool.begin().await?;

        // At most one default per customer: unset the previous one first.
        if new.is_default {
            sqlx::query(
                "UPDATE addresses SET is_default = FALSE \
                 WHERE customer_id = $1 AND is_default",
            )
            .bind(new.customer_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        let id = AddressId::new();
        let row = sqlx::query(
            "INSERT INTO addresses (id, customer_id, label, full_address, lat, lng, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, customer_id, label, full_address, lat, lng, is_default",
        )
        .bind(id.as_uuid())
        .bind(new.customer_id.as_uuid())
        .bind(&new.label)
        .bind(&new.full_address)
        .bind(new.lat)
        .bind(new.lng)
        .bind(new.is_default)
        .fetch_one(&mut *tx)
        .await?;

        let address = Self::row_to_address(&row)?;
        tx.commit().await?;
        Ok(address)
    }

    async fn list_addresses(&self, owner: CustomerId) -> Result<Vec<Address>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, label, full_address, lat, lng, is_default \
             FROM addresses WHERE customer_id = $1 ORDER BY is_default DESC",
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_address).collect()
    }

    async fn delete_owned(&self, id: AddressId, owner: CustomerId) -> Result<bool> {
        // The guard keeps the orders.address_id foreign key from ever firing:
        // an address referenced by a committed order is simply not deletable.
        let result = sqlx::query(
            "DELETE FROM addresses WHERE id = $1 AND customer_id = $2 \
             AND NOT EXISTS (SELECT 1 FROM orders WHERE address_id = $1)",
        )
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create_order(&self, new: NewOrder) -> Result<OrderDetails> {
        let mut tx = self.pool.begin().await?;

        // Conditional relative decrement: the WHERE guard re-validates
        // sufficiency inside the same atomic unit that performs the write,
        // so concurrent checkouts serialize on the row and can never drive
        // stock negative. Zero rows affected means another checkout won the
        // race; the early return drops the transaction and rolls back every
        // decrement already applied.
        for item in &new.items {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("products_stock_check")
                {
                    return StoreError::StockConflict {
                        product_id: item.product_id,
                    };
                }
                StoreError::Database(e)
            })?;

            if result.rows_affected() == 0 {
                return Err(StoreError::StockConflict {
                    product_id: item.product_id,
                });
            }
        }

        let order_id = OrderId::new();
        sqlx::query(
            "INSERT INTO orders \
             (id, customer_id, address_id, status, total_minor, delivery_fee_minor, \
              discount_minor, delivery_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order_id.as_uuid())
        .bind(new.customer_id.as_uuid())
        .bind(new.address_id.as_uuid())
        .bind(OrderStatus::Pending.as_str())
        .bind(new.total_amount.minor())
        .bind(new.delivery_fee.minor())
        .bind(new.discount.minor())
        .bind(&new.delivery_notes)
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in new.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, product_id, quantity, unit_price_minor, line_no) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.unit_price.minor())
            .bind(line_no as i32)
            .execute(&mut *tx)
            .await?;
        }

        let details =
            Self::load_order(&mut tx, order_id)
                .await?
                .ok_or_else(|| StoreError::MissingRow {
                    entity: "order",
                    id: order_id.to_string(),
                })?;

        tx.commit().await?;
        Ok(details)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_order(&mut conn, id).await
    }

    async fn list_orders(&self, query: OrderListQuery) -> Result<Page<OrderDetails>> {
        let mut where_sql = String::from(" WHERE TRUE");
        let mut param_count = 0;

        if query.customer.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{where_sql}");
        let total: i64 = bind_order_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let offset = i64::from(query.page.saturating_sub(1)) * i64::from(query.limit);
        let list_sql = format!(
            "SELECT id, customer_id, address_id, status, total_minor, delivery_fee_minor, \
             discount_minor, delivery_notes, created_at, updated_at \
             FROM orders{where_sql} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_order_filters(sqlx::query(&list_sql), &query)
            .bind(i64::from(query.limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let orders: Result<Vec<Order>> = rows.iter().map(Self::row_to_order).collect();
        let mut conn = self.pool.acquire().await?;
        let items = Self::hydrate_orders(&mut conn, orders?).await?;

        Ok(Page {
            items,
            total: total as u64,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Option<OrderDetails>> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let mut conn = self.pool.acquire().await?;
        Self::load_order(&mut conn, id).await
    }
}

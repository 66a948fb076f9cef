//! The order engine: validation, pricing, and atomic commit of checkouts,
//! plus authorized order reads and status updates.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use common::{Money, OrderId, ProductId};
use store::{
    NewOrder, NewOrderItem, OrderDetails, OrderListQuery, OrderStatus, Page, Store, StoreError,
};

use crate::checkout::{OrderFilter, PlaceOrder, Requester};
use crate::error::{DomainError, OrderError};
use crate::pricing::{PriceLine, price_order};

/// Flat delivery fee applied uniformly to every order.
pub const DELIVERY_FEE: Money = Money::from_units(50);

/// Largest page size a caller may request from a listing.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Validates and atomically commits checkout requests against a store.
///
/// The engine itself holds no locks: concurrent checkouts are serialized by
/// the store's transactional conditional decrement, and the read-time stock
/// check here exists only to fail fast with a good error message.
#[derive(Clone)]
pub struct OrderEngine<S: Store> {
    store: S,
}

impl<S: Store> OrderEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates a proposed cart, prices it, and commits it atomically.
    ///
    /// Unit prices are snapshotted from the catalog at validation time; the
    /// total is always server-computed. On any failure no partial effect
    /// remains: validation happens before any write, and the commit is one
    /// storage transaction.
    #[tracing::instrument(skip(self, cmd), fields(customer = %requester.customer_id))]
    pub async fn place_order(
        &self,
        requester: Requester,
        cmd: PlaceOrder,
    ) -> Result<OrderDetails, DomainError> {
        let started = Instant::now();

        if cmd.items.is_empty() {
            return Err(OrderError::NoItems.into());
        }
        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                }
                .into());
            }
        }

        let customer_id = requester.customer_id;
        self.store
            .find_owned(cmd.address_id, customer_id)
            .await?
            .ok_or(OrderError::InvalidAddress)?;

        // Batch resolve, active products only. A shorter result than the
        // distinct request set means something is missing or deactivated.
        let mut seen = HashSet::new();
        let distinct: Vec<ProductId> = cmd
            .items
            .iter()
            .map(|item| item.product_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let products = self.store.find_active_by_ids(&distinct).await?;
        if products.len() != distinct.len() {
            return Err(OrderError::ProductUnavailable.into());
        }
        let by_id: HashMap<ProductId, _> = products.into_iter().map(|p| (p.id, p)).collect();

        let mut lines = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let product = &by_id[&item.product_id];
            if i64::from(product.stock) < i64::from(item.quantity) {
                return Err(OrderError::InsufficientStock {
                    product: product.name.clone(),
                }
                .into());
            }
            lines.push(NewOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let price_lines: Vec<PriceLine> = lines
            .iter()
            .map(|line| PriceLine {
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect();
        let discount = Money::zero();
        let totals = price_order(&price_lines, DELIVERY_FEE, discount);

        let result = self
            .store
            .create_order(NewOrder {
                customer_id,
                address_id: cmd.address_id,
                total_amount: totals.total,
                delivery_fee: DELIVERY_FEE,
                discount,
                delivery_notes: cmd.delivery_notes,
                items: lines,
            })
            .await;

        match result {
            Ok(details) => {
                metrics::counter!("orders_placed").increment(1);
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(order_id = %details.order.id, total = %details.order.total_amount, "order placed");
                Ok(details)
            }
            Err(StoreError::StockConflict { product_id }) => {
                // Lost the race between the read-time check and the commit.
                // Nothing was persisted; the caller may retry.
                metrics::counter!("orders_stock_conflicts").increment(1);
                tracing::warn!(%product_id, "stock conflict at commit time");
                Err(StoreError::StockConflict { product_id }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads an order for its owner or an admin.
    ///
    /// Anyone else gets [`OrderError::NotFound`], identical to a missing
    /// order, so existence is never leaked.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        requester: Requester,
    ) -> Result<OrderDetails, DomainError> {
        let details = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !requester.is_admin() && details.order.customer_id != requester.customer_id {
            return Err(OrderError::NotFound.into());
        }

        Ok(details)
    }

    /// Pages through orders, newest first.
    ///
    /// Non-admins are always scoped to their own orders, whatever filter
    /// they supply; `limit` is clamped to [`MAX_PAGE_SIZE`].
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        requester: Requester,
        filter: OrderFilter,
    ) -> Result<Page<OrderDetails>, DomainError> {
        let customer = if requester.is_admin() {
            None
        } else {
            Some(requester.customer_id)
        };

        let query = OrderListQuery {
            customer,
            status: filter.status,
            page: filter.page.max(1),
            limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
        };

        Ok(self.store.list_orders(query).await?)
    }

    /// Sets an order's status. Admin only; any status may move to any other
    /// status, there is no transition graph.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        requester: Requester,
    ) -> Result<OrderDetails, DomainError> {
        if !requester.is_admin() {
            return Err(OrderError::Unauthorized.into());
        }

        let details = self
            .store
            .set_status(order_id, new_status)
            .await?
            .ok_or(OrderError::NotFound)?;

        tracing::info!(order_id = %order_id, status = %new_status, "order status updated");
        Ok(details)
    }
}

//! Checkout and order endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{OrderEngine, OrderFilter, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{OrderDetails, OrderStatus, Page, Store};

use crate::error::ApiError;
use crate::extract::Json;
use crate::identity::Identity;
use crate::routes::addresses::AddressResponse;
use crate::routes::products::ProductResponse;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub engine: OrderEngine<S>,
    pub store: S,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total_minor: i64,
    pub delivery_fee_minor: i64,
    pub discount_minor: i64,
    pub delivery_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemResponse>,
    pub address: AddressResponse,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product: ProductResponse,
    pub quantity: u32,
    pub unit_price_minor: i64,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub items: Vec<OrderResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let items = details
            .items
            .into_iter()
            .map(|line| OrderItemResponse {
                product: line.product.into(),
                quantity: line.item.quantity,
                unit_price_minor: line.item.unit_price.minor(),
            })
            .collect();

        OrderResponse {
            id: details.order.id.to_string(),
            customer_id: details.order.customer_id.to_string(),
            status: details.order.status,
            total_minor: details.order.total_amount.minor(),
            delivery_fee_minor: details.order.delivery_fee.minor(),
            discount_minor: details.order.discount.minor(),
            delivery_notes: details.order.delivery_notes,
            created_at: details.order.created_at.to_rfc3339(),
            updated_at: details.order.updated_at.to_rfc3339(),
            items,
            address: details.address.into(),
        }
    }
}

impl From<Page<OrderDetails>> for OrderListResponse {
    fn from(page: Page<OrderDetails>) -> Self {
        let total_pages = page.total_pages();
        OrderListResponse {
            items: page.items.into_iter().map(OrderResponse::from).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

// -- Handlers --

/// POST /orders — validate and atomically commit a checkout.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let details = state.engine.place_order(identity.requester(), req).await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

/// GET /orders — page through orders; non-admins see only their own.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let filter = OrderFilter {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(10),
        status: params.status,
    };
    let page = state
        .engine
        .list_orders(identity.requester(), filter)
        .await?;
    Ok(Json(page.into()))
}

/// GET /orders/:id — load one order; 404 unless owner or admin.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let details = state.engine.get_order(id, identity.requester()).await?;
    Ok(Json(details.into()))
}

/// PATCH /orders/:id/status — admin-only status change.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let details = state
        .engine
        .update_status(id, req.status, identity.requester())
        .await?;
    Ok(Json(details.into()))
}

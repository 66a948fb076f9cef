//! Product catalog endpoints. Reads are public; mutations are admin-only.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{Category, NewProduct, Product, ProductFilter, ProductUpdate, Store};

use crate::error::ApiError;
use crate::extract::Json;
use crate::identity::Identity;
use crate::routes::orders::AppState;

const DEFAULT_PAGE_SIZE: u32 = 12;
const MAX_PAGE_SIZE: u32 = 50;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListProductsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub price_minor: i64,
    pub stock: i32,
    pub category: Category,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub pack_size: String,
}

#[derive(Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price_minor: Option<i64>,
    pub stock: Option<i32>,
    pub category: Option<Category>,
    pub image_url: Option<String>,
    pub pack_size: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price_minor: i64,
    pub stock: i32,
    pub category: Category,
    pub image_url: String,
    pub pack_size: String,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub items: Vec<ProductResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        ProductResponse {
            id: product.id.to_string(),
            name: product.name,
            brand: product.brand,
            description: product.description,
            price_minor: product.price.minor(),
            stock: product.stock,
            category: product.category,
            image_url: product.image_url,
            pack_size: product.pack_size,
            is_active: product.is_active,
        }
    }
}

// -- Handlers --

/// GET /products — public paged catalog listing with filters.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let filter = ProductFilter {
        page: params.page.unwrap_or(1).max(1),
        limit: params
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
        category: params.category,
        brand: params.brand,
        price_min: params.price_min.map(Money::from_minor),
        price_max: params.price_max.map(Money::from_minor),
        search: params.search,
    };
    let page = state.store.list_products(filter).await?;
    let total_pages = page.total_pages();
    Ok(Json(ProductListResponse {
        items: page.items.into_iter().map(ProductResponse::from).collect(),
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages,
    }))
}

/// GET /products/:id — 404 for missing or deactivated products.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .find_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product.into()))
}

/// POST /products — admin-only creation.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    identity.require_admin()?;
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if req.price_minor <= 0 {
        return Err(ApiError::validation("price_minor must be positive"));
    }
    if req.stock < 0 {
        return Err(ApiError::validation("stock must not be negative"));
    }
    let product = state
        .store
        .create_product(NewProduct {
            name: req.name,
            brand: req.brand,
            description: req.description,
            price: Money::from_minor(req.price_minor),
            stock: req.stock,
            category: req.category,
            image_url: req.image_url,
            pack_size: req.pack_size,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/:id — admin-only partial update.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    identity.require_admin()?;
    if let Some(price) = req.price_minor
        && price <= 0
    {
        return Err(ApiError::validation("price_minor must be positive"));
    }
    if let Some(stock) = req.stock
        && stock < 0
    {
        return Err(ApiError::validation("stock must not be negative"));
    }
    let update = ProductUpdate {
        name: req.name,
        brand: req.brand,
        description: req.description,
        price: req.price_minor.map(Money::from_minor),
        stock: req.stock,
        category: req.category,
        image_url: req.image_url,
        pack_size: req.pack_size,
    };
    let product = state
        .store
        .update_product(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product.into()))
}

/// DELETE /products/:id — admin-only soft delete.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    identity.require_admin()?;
    let deleted = state.store.deactivate_product(id).await?;
    if !deleted {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

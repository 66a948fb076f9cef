//! Delivery address endpoints. Every operation is scoped to the caller.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AddressId;
use serde::{Deserialize, Serialize};
use store::{Address, NewAddress, Store};

use crate::error::ApiError;
use crate::extract::Json;
use crate::identity::Identity;
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateAddressRequest {
    pub label: String,
    pub full_address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub is_default: bool,
}

// -- Response types --

#[derive(Serialize)]
pub struct AddressResponse {
    pub id: String,
    pub label: String,
    pub full_address: String,
    pub lat: f64,
    pub lng: f64,
    pub is_default: bool,
}

impl From<Address> for AddressResponse {
    fn from(address: Address) -> Self {
        AddressResponse {
            id: address.id.to_string(),
            label: address.label,
            full_address: address.full_address,
            lat: address.lat,
            lng: address.lng,
            is_default: address.is_default,
        }
    }
}

// -- Handlers --

/// GET /addresses — list the caller's addresses.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<AddressResponse>>, ApiError> {
    let addresses = state.store.list_addresses(identity.customer_id).await?;
    Ok(Json(
        addresses.into_iter().map(AddressResponse::from).collect(),
    ))
}

/// POST /addresses — create an address for the caller.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<AddressResponse>), ApiError> {
    if req.label.trim().is_empty() {
        return Err(ApiError::validation("label must not be empty"));
    }
    if req.full_address.trim().len() < 5 {
        return Err(ApiError::validation(
            "full_address must be at least 5 characters",
        ));
    }
    let address = state
        .store
        .create_address(NewAddress {
            customer_id: identity.customer_id,
            label: req.label,
            full_address: req.full_address,
            lat: req.lat,
            lng: req.lng,
            is_default: req.is_default,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(address.into())))
}

/// DELETE /addresses/:id — delete one of the caller's addresses.
///
/// A foreign or unknown id is a 404 either way, so existence of other
/// customers' addresses is never revealed.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.store.delete_owned(id, identity.customer_id).await?;
    if !deleted {
        return Err(ApiError::not_found("Address not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

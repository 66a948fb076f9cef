//! Request identity extraction.
//!
//! Token issuance and verification live in an upstream auth gateway; by the
//! time a request reaches this service the gateway has already validated the
//! bearer token and injected the caller's identity as trusted headers. This
//! extractor is the seam where that identity enters the application.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{CustomerId, Role};
use domain::Requester;

use crate::error::ApiError;

/// Header carrying the authenticated customer id (UUID).
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated role (`CUSTOMER` or `ADMIN`).
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated identity of the current request.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub customer_id: CustomerId,
    pub role: Role,
}

impl Identity {
    /// Converts to the domain-layer requester.
    pub fn requester(&self) -> Requester {
        Requester {
            customer_id: self.customer_id,
            role: self.role,
        }
    }

    /// Returns the identity if it carries the admin role, otherwise a 403.
    pub fn require_admin(self) -> Result<Self, ApiError> {
        if self.role.is_admin() {
            Ok(self)
        } else {
            Err(ApiError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
        };

        let customer_id: CustomerId = header(USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid identity".to_string()))?;
        let role: Role = header(USER_ROLE_HEADER)?
            .parse()
            .map_err(|()| ApiError::Unauthorized("Invalid identity".to_string()))?;

        Ok(Identity { customer_id, role })
    }
}

//! Request extractors for tenant context and JSON bodies.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use coffer_shared::{AppError, AppResult};
use coffer_shared::types::{TenantId, UserId};

use crate::error::ApiError;

/// Header carrying the tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header carrying the acting user id.
pub const USER_HEADER: &str = "x-user-id";

/// Tenant and acting user resolved from request headers.
///
/// Every ledger route requires `X-Tenant-Id`; `X-User-Id` is optional and,
/// when present, is recorded as the author of postings, voids and closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant every query is scoped to.
    pub tenant_id: TenantId,
    /// Acting user, if supplied.
    pub user_id: Option<UserId>,
}

impl TenantContext {
    /// Reads the context from request headers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MissingTenant` if the tenant header is absent or
    /// not a UUID, and `AppError::Validation` for a malformed user header.
    pub fn from_headers(headers: &HeaderMap) -> AppResult<Self> {
        let tenant_id = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::MissingTenant("X-Tenant-Id header is required".into()))?
            .parse::<TenantId>()
            .map_err(|_| AppError::MissingTenant("X-Tenant-Id must be a UUID".into()))?;

        let user_id = match headers.get(USER_HEADER).and_then(|v| v.to_str().ok()) {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<UserId>()
                    .map_err(|_| AppError::Validation("X-User-Id must be a UUID".into()))?,
            ),
            _ => None,
        };

        Ok(Self { tenant_id, user_id })
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers)?)
    }
}

/// JSON body whose rejections use the API error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejections use the API error shape.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string whose rejections use the API error shape.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

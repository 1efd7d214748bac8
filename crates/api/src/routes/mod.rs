//! API route definitions.
//!
//! Every route except `/health` is tenant scoped through the
//! `X-Tenant-Id` header.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppState;

pub mod health;
pub mod journal;
pub mod periods;
pub mod wallets;

/// Creates the API router with all routes.
pub fn api_routes() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(health::routes())
        .merge(wallets::routes())
        .merge(journal::routes())
        .merge(periods::routes())
}

/// Responds 201 for a first write and 200 for an idempotent replay.
pub(crate) fn write_response<T: Serialize>(is_duplicate: bool, body: T) -> Response {
    let status = if is_duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(body)).into_response()
}

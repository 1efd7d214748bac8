//! Financial period routes.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use coffer_core::period::PeriodCode;
use serde_json::json;

use crate::{
    AppState,
    error::ApiError,
    extractors::{AppPath, TenantContext},
};

/// Creates the period routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/periods", get(list_periods))
        .route("/periods/current", get(current_period))
        .route("/periods/{code}", get(get_period))
        .route("/periods/{code}/close", post(close_period))
        .route("/periods/{code}/reopen", post(reopen_period))
}

/// GET `/periods` - List the tenant's periods, oldest first.
async fn list_periods(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let periods = state.periods.list_periods(ctx.tenant_id).await?;
    Ok(Json(json!({ "periods": periods })))
}

/// GET `/periods/current` - The period containing today, created if missing.
async fn current_period(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let period = state.periods.current_period(ctx.tenant_id).await?;
    Ok(Json(period))
}

async fn get_period(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(code): AppPath<PeriodCode>,
) -> Result<impl IntoResponse, ApiError> {
    let period = state.periods.get_period(ctx.tenant_id, code).await?;
    Ok(Json(period))
}

/// POST `/periods/{code}/close` - Stop postings dated in the period.
async fn close_period(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(code): AppPath<PeriodCode>,
) -> Result<impl IntoResponse, ApiError> {
    let period = state
        .periods
        .close_period(ctx.tenant_id, code, ctx.user_id)
        .await?;
    Ok(Json(period))
}

/// POST `/periods/{code}/reopen` - Accept postings in a closed period again.
async fn reopen_period(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(code): AppPath<PeriodCode>,
) -> Result<impl IntoResponse, ApiError> {
    let period = state.periods.reopen_period(ctx.tenant_id, code).await?;
    Ok(Json(period))
}

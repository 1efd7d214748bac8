//! Wallet and transfer routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use coffer_core::wallet::{
    HoldInput, MovementInput, TransferInput, WalletFilter, WalletStatus, WalletType,
};
use coffer_shared::types::{PageRequest, WalletId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState,
    error::ApiError,
    extractors::{AppJson, AppPath, AppQuery, TenantContext},
    routes::write_response,
};

/// Creates the wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallets", post(get_or_create_wallet).get(list_wallets))
        .route("/wallets/{wallet_id}", get(get_wallet))
        .route("/wallets/{wallet_id}/entries", get(list_entries))
        .route("/wallets/{wallet_id}/credit", post(credit))
        .route("/wallets/{wallet_id}/debit", post(debit))
        .route("/wallets/{wallet_id}/holds", post(hold))
        .route("/wallets/{wallet_id}/holds/{hold_id}/release", post(release))
        .route("/wallets/{wallet_id}/holds/{hold_id}/capture", post(capture))
        .route("/wallets/{wallet_id}/status", patch(set_status))
        .route("/wallets/{wallet_id}/recalculate", post(recalculate))
        .route("/transfers", post(transfer))
}

/// Request body for resolving a wallet.
#[derive(Debug, Deserialize)]
pub struct GetOrCreateWalletRequest {
    /// Wallet type.
    pub wallet_type: WalletType,
    /// Customer id for customer wallets.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Vendor id for vendor wallets.
    #[serde(default)]
    pub vendor_id: Option<String>,
    /// ISO currency; defaults to the configured ledger currency.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Request body for releasing or capturing a hold.
#[derive(Debug, Deserialize)]
pub struct HoldActionRequest {
    /// Amount to release or capture.
    pub amount: Decimal,
    /// Optional idempotency key.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl HoldActionRequest {
    fn into_input(self, hold_id: String) -> HoldInput {
        HoldInput {
            amount: self.amount,
            hold_id,
            idempotency_key: self.idempotency_key,
            description: self.description,
        }
    }
}

/// Request body for a status change.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// Target status.
    pub status: WalletStatus,
}

/// POST `/wallets` - Resolve a wallet by owner and currency, creating it if needed.
async fn get_or_create_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppJson(payload): AppJson<GetOrCreateWalletRequest>,
) -> Result<Response, ApiError> {
    let currency = payload
        .currency
        .unwrap_or_else(|| state.ledger.default_currency.clone());
    let (wallet, created) = state
        .wallets
        .get_or_create_wallet(
            ctx.tenant_id,
            payload.wallet_type,
            payload.customer_id.as_deref(),
            payload.vendor_id.as_deref(),
            &currency,
        )
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "wallet": wallet, "created": created }))).into_response())
}

/// GET `/wallets` - List wallets with optional type, status and currency filters.
async fn list_wallets(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppQuery(filter): AppQuery<WalletFilter>,
    AppQuery(page): AppQuery<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallets = state.wallets.list_wallets(ctx.tenant_id, &filter, page).await?;
    Ok(Json(wallets))
}

/// GET `/wallets/{wallet_id}` - Fetch a wallet.
async fn get_wallet(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.wallets.get_wallet(ctx.tenant_id, wallet_id).await?;
    Ok(Json(json!({
        "available_balance": wallet.available_balance(),
        "wallet": wallet,
    })))
}

/// GET `/wallets/{wallet_id}/entries` - Page through the entry log in sequence order.
async fn list_entries(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
    AppQuery(page): AppQuery<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .wallets
        .list_wallet_entries(ctx.tenant_id, wallet_id, page)
        .await?;
    Ok(Json(entries))
}

async fn credit(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
    AppJson(input): AppJson<MovementInput>,
) -> Result<Response, ApiError> {
    let result = state.wallets.credit(ctx.tenant_id, wallet_id, input).await?;
    Ok(write_response(result.is_duplicate, result))
}

async fn debit(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
    AppJson(input): AppJson<MovementInput>,
) -> Result<Response, ApiError> {
    let result = state.wallets.debit(ctx.tenant_id, wallet_id, input).await?;
    Ok(write_response(result.is_duplicate, result))
}

async fn hold(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
    AppJson(input): AppJson<HoldInput>,
) -> Result<Response, ApiError> {
    let result = state.wallets.hold(ctx.tenant_id, wallet_id, input).await?;
    Ok(write_response(result.is_duplicate, result))
}

async fn release(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath((wallet_id, hold_id)): AppPath<(WalletId, String)>,
    AppJson(payload): AppJson<HoldActionRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .wallets
        .release(ctx.tenant_id, wallet_id, payload.into_input(hold_id))
        .await?;
    Ok(write_response(result.is_duplicate, result))
}

async fn capture(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath((wallet_id, hold_id)): AppPath<(WalletId, String)>,
    AppJson(payload): AppJson<HoldActionRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .wallets
        .capture(ctx.tenant_id, wallet_id, payload.into_input(hold_id))
        .await?;
    Ok(write_response(result.is_duplicate, result))
}

/// PATCH `/wallets/{wallet_id}/status` - Freeze, unfreeze or close a wallet.
async fn set_status(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
    AppJson(payload): AppJson<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state
        .wallets
        .set_wallet_status(ctx.tenant_id, wallet_id, payload.status)
        .await?;
    Ok(Json(wallet))
}

/// POST `/wallets/{wallet_id}/recalculate` - Rebuild cached balances from the entry log.
async fn recalculate(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(wallet_id): AppPath<WalletId>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .wallets
        .recalculate_balance(ctx.tenant_id, wallet_id)
        .await?;
    Ok(Json(report))
}

/// POST `/transfers` - Move funds between two wallets of the tenant.
async fn transfer(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppJson(input): AppJson<TransferInput>,
) -> Result<Response, ApiError> {
    let result = state.wallets.transfer(ctx.tenant_id, input).await?;
    Ok(write_response(result.is_duplicate, result))
}

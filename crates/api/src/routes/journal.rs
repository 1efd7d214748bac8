//! Chart of accounts, journal entry and event posting routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use coffer_core::journal::{EventPostingInput, JournalEntryFilter, ManualEntryInput, VoidInput};
use coffer_shared::types::{JournalEntryId, PageRequest};
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState,
    error::ApiError,
    extractors::{AppJson, AppPath, AppQuery, TenantContext},
    routes::write_response,
};

/// Creates the journal routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ledger-accounts", get(list_accounts))
        .route("/ledger-accounts/seed", post(seed_accounts))
        .route("/ledger-accounts/{code}", patch(update_account))
        .route("/journal-entries", get(list_entries).post(post_manual_entry))
        .route("/journal-entries/{entry_id}", get(get_entry))
        .route("/journal-entries/{entry_id}/void", post(void_entry))
        .route("/journal-entries/{entry_id}/integrity", get(verify_integrity))
        .route("/journal-events", post(post_event))
        .route("/journal-events/{source_id}", get(lookup_by_source))
        .route("/trial-balance", get(trial_balance))
}

/// Request body for activating or deactivating an account.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    /// Whether the account accepts new postings.
    pub is_active: bool,
}

/// GET `/ledger-accounts` - List the tenant's chart of accounts.
async fn list_accounts(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.journal.list_accounts(ctx.tenant_id).await?;
    Ok(Json(json!({ "accounts": accounts })))
}

/// POST `/ledger-accounts/seed` - Create any missing default accounts.
async fn seed_accounts(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.journal.seed_chart_of_accounts(ctx.tenant_id).await?;
    Ok(Json(json!({ "accounts": accounts })))
}

/// PATCH `/ledger-accounts/{code}` - Toggle whether an account accepts postings.
async fn update_account(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .journal
        .set_account_active(ctx.tenant_id, &code, payload.is_active)
        .await?;
    Ok(Json(account))
}

/// GET `/journal-entries` - List entries, newest first.
async fn list_entries(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppQuery(filter): AppQuery<JournalEntryFilter>,
    AppQuery(page): AppQuery<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.journal.list_entries(ctx.tenant_id, &filter, page).await?;
    Ok(Json(entries))
}

/// POST `/journal-entries` - Post a balanced manual entry.
async fn post_manual_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppJson(mut input): AppJson<ManualEntryInput>,
) -> Result<Response, ApiError> {
    input.created_by = ctx.user_id.or(input.created_by);
    let result = state.journal.post_manual_entry(ctx.tenant_id, input).await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

async fn get_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(entry_id): AppPath<JournalEntryId>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.journal.get_entry(ctx.tenant_id, entry_id).await?;
    Ok(Json(entry))
}

/// POST `/journal-entries/{entry_id}/void` - Void an entry by posting its mirror.
async fn void_entry(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(entry_id): AppPath<JournalEntryId>,
    AppJson(mut input): AppJson<VoidInput>,
) -> Result<Response, ApiError> {
    input.voided_by = ctx.user_id.or(input.voided_by);
    let result = state
        .journal
        .void_entry(ctx.tenant_id, entry_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

async fn verify_integrity(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(entry_id): AppPath<JournalEntryId>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .journal
        .verify_integrity(ctx.tenant_id, entry_id)
        .await?;
    Ok(Json(report))
}

/// POST `/journal-events` - Post a business event through its template.
///
/// Replays of a `source_id` already posted return the original entry with 200.
async fn post_event(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppJson(mut input): AppJson<EventPostingInput>,
) -> Result<Response, ApiError> {
    input.created_by = ctx.user_id.or(input.created_by);
    let result = state.journal.post_event(ctx.tenant_id, input).await?;
    Ok(write_response(result.is_duplicate, result))
}

/// GET `/journal-events/{source_id}` - Find the entry posted for a business event.
async fn lookup_by_source(
    State(state): State<AppState>,
    ctx: TenantContext,
    AppPath(source_id): AppPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .journal
        .lookup_by_source(ctx.tenant_id, &source_id)
        .await?;
    Ok(Json(entry))
}

async fn trial_balance(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.journal.trial_balance(ctx.tenant_id).await?;
    Ok(Json(report))
}

//! HTTP API layer with Axum routes over the ledger repositories.
//!
//! This crate provides:
//! - REST API routes for wallets, the journal and periods
//! - Tenant context and JSON extractors
//! - The error-to-response mapping

pub mod error;
pub mod extractors;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use coffer_db::{JournalRepository, PeriodRepository, WalletRepository};
use coffer_shared::config::LedgerConfig;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool, used by the readiness probe.
    pub db: DatabaseConnection,
    /// Wallet balances, holds and transfers.
    pub wallets: Arc<WalletRepository>,
    /// Chart of accounts and journal postings.
    pub journal: Arc<JournalRepository>,
    /// Financial periods.
    pub periods: Arc<PeriodRepository>,
    /// Ledger behaviour.
    pub ledger: LedgerConfig,
}

impl AppState {
    /// Builds the repositories over one connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self {
            db: db.clone(),
            wallets: Arc::new(WalletRepository::new(db.clone())),
            journal: Arc::new(JournalRepository::new(db.clone(), ledger.clone())),
            periods: Arc::new(PeriodRepository::new(db, ledger.clone())),
            ledger,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for wallets, journal entries and periods
//! - Repositories that run every ledger mutation in one row-locked transaction
//! - Database migrations, including the append-only triggers

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    JournalRepository, PeriodRepository, PgIdempotencyStore, RepositoryError, WalletRepository,
};

use std::time::Duration;

use coffer_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}

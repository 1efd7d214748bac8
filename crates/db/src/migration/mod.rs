//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and written as raw SQL.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_wallets;
mod m20260301_000002_journal;
mod m20260301_000003_idempotency;
mod m20260301_000004_append_only;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_wallets::Migration),
            Box::new(m20260301_000002_journal::Migration),
            Box::new(m20260301_000003_idempotency::Migration),
            Box::new(m20260301_000004_append_only::Migration),
        ]
    }
}

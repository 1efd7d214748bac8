//! Idempotency records.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(IDEMPOTENCY_RECORDS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS idempotency_records CASCADE;")
            .await?;
        Ok(())
    }
}

const IDEMPOTENCY_RECORDS_SQL: &str = r"
-- storage_key is SCOPE:key or SCOPE:wallet_id:key
CREATE TABLE idempotency_records (
    tenant_id UUID NOT NULL,
    storage_key TEXT NOT NULL,
    scope TEXT NOT NULL,
    wallet_id UUID,
    idempotency_key TEXT NOT NULL,
    response JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, storage_key)
);
";

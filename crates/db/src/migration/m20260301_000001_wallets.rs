//! Wallet tables.
//!
//! Creates wallets and the append-only wallet ledger. Enum values are TEXT
//! with CHECK constraints matching the `coffer-core` enums.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(WALLETS_SQL).await?;
        db.execute_unprepared(WALLET_LEDGER_ENTRIES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS wallet_ledger_entries CASCADE; DROP TABLE IF EXISTS wallets CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const WALLETS_SQL: &str = r"
CREATE TABLE wallets (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    wallet_type TEXT NOT NULL,
    customer_id TEXT,
    vendor_id TEXT,
    currency CHAR(3) NOT NULL,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    pending_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    last_sequence BIGINT NOT NULL DEFAULT 0,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_wallet_type CHECK (wallet_type IN ('CUSTOMER', 'VENDOR', 'PLATFORM')),
    CONSTRAINT chk_wallet_status CHECK (status IN ('ACTIVE', 'FROZEN', 'CLOSED')),
    CONSTRAINT chk_wallet_owner CHECK (
        (wallet_type = 'CUSTOMER' AND customer_id IS NOT NULL AND vendor_id IS NULL)
        OR (wallet_type = 'VENDOR' AND vendor_id IS NOT NULL AND customer_id IS NULL)
        OR (wallet_type = 'PLATFORM' AND customer_id IS NULL AND vendor_id IS NULL)
    ),
    CONSTRAINT chk_wallet_balance CHECK (balance >= 0),
    CONSTRAINT chk_wallet_pending CHECK (pending_balance >= 0),
    CONSTRAINT chk_wallet_sequence CHECK (last_sequence >= 0)
);

-- Exactly one wallet per (tenant, type, owner, currency)
CREATE UNIQUE INDEX uq_wallet_identity ON wallets (
    tenant_id,
    wallet_type,
    COALESCE(customer_id, ''),
    COALESCE(vendor_id, ''),
    currency
);

CREATE INDEX idx_wallets_tenant ON wallets(tenant_id, id);
";

const WALLET_LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE wallet_ledger_entries (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    wallet_id UUID NOT NULL REFERENCES wallets(id),
    sequence BIGINT NOT NULL,
    entry_type TEXT NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    pending_delta NUMERIC(19, 4) NOT NULL DEFAULT 0,
    hold_id TEXT,
    idempotency_key TEXT NOT NULL,
    description TEXT,
    reference_type TEXT,
    reference_id TEXT,
    balance_after NUMERIC(19, 4) NOT NULL,
    pending_after NUMERIC(19, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_sequence CHECK (sequence >= 1),
    CONSTRAINT chk_entry_shape CHECK (
        (entry_type IN ('CREDIT_SALE_PROCEEDS', 'CREDIT_PLATFORM_FEE', 'CREDIT_REFUND', 'CREDIT_ADJUSTMENT')
            AND amount > 0 AND pending_delta = 0 AND hold_id IS NULL)
        OR (entry_type IN ('DEBIT_PAYOUT', 'DEBIT_PLATFORM_FEE')
            AND amount < 0 AND pending_delta = 0 AND hold_id IS NULL)
        OR (entry_type = 'HOLD_CREATED' AND amount = 0 AND pending_delta > 0 AND hold_id IS NOT NULL)
        OR (entry_type = 'HOLD_RELEASED' AND amount = 0 AND pending_delta < 0 AND hold_id IS NOT NULL)
        OR (entry_type = 'HOLD_CAPTURED' AND amount < 0 AND pending_delta < 0 AND hold_id IS NOT NULL)
    ),
    UNIQUE (wallet_id, sequence),
    UNIQUE (wallet_id, entry_type, idempotency_key)
);

-- A hold is created once and terminated once
CREATE UNIQUE INDEX uq_hold_created ON wallet_ledger_entries(wallet_id, hold_id)
    WHERE entry_type = 'HOLD_CREATED';
CREATE UNIQUE INDEX uq_hold_terminated ON wallet_ledger_entries(wallet_id, hold_id)
    WHERE entry_type IN ('HOLD_RELEASED', 'HOLD_CAPTURED');

CREATE INDEX idx_wle_wallet_sequence ON wallet_ledger_entries(wallet_id, sequence);
";

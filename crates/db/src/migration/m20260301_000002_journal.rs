//! Chart of accounts, journal and period tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_ACCOUNTS_SQL).await?;
        db.execute_unprepared(FINANCIAL_PERIODS_SQL).await?;
        db.execute_unprepared(JOURNAL_SEQUENCES_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const LEDGER_ACCOUNTS_SQL: &str = r"
CREATE TABLE ledger_accounts (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    code VARCHAR(20) NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    current_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    period_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    period_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    period_code CHAR(7),
    is_active BOOLEAN NOT NULL DEFAULT true,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_category CHECK (
        category IN ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE')
    ),
    UNIQUE (tenant_id, code)
);
";

const FINANCIAL_PERIODS_SQL: &str = r"
CREATE TABLE financial_periods (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    code CHAR(7) NOT NULL,
    status TEXT NOT NULL DEFAULT 'OPEN',
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    closed_at TIMESTAMPTZ,
    closed_by UUID,
    reopened_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_period_status CHECK (status IN ('OPEN', 'CLOSED')),
    CONSTRAINT chk_period_dates CHECK (end_date >= start_date),
    UNIQUE (tenant_id, code)
);
";

const JOURNAL_SEQUENCES_SQL: &str = r"
CREATE TABLE journal_sequences (
    tenant_id UUID PRIMARY KEY,
    last_number BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    entry_number VARCHAR(20) NOT NULL,
    sequence BIGINT NOT NULL,
    entry_date DATE NOT NULL,
    period_code CHAR(7) NOT NULL,
    description TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_id TEXT,
    event_id TEXT,
    reverses_entry_id UUID REFERENCES journal_entries(id),
    reversed_by_entry_id UUID REFERENCES journal_entries(id),
    status TEXT NOT NULL DEFAULT 'POSTED',
    void_reason TEXT,
    voided_at TIMESTAMPTZ,
    voided_by UUID,
    total_debit NUMERIC(19, 4) NOT NULL,
    total_credit NUMERIC(19, 4) NOT NULL,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_journal_status CHECK (status IN ('POSTED', 'VOIDED')),
    CONSTRAINT chk_journal_source CHECK (source_type IN (
        'MANUAL', 'REVERSAL', 'POS_SALE', 'SVM_ORDER', 'REFUND',
        'INVENTORY_ADJUSTMENT', 'VENDOR_PAYOUT', 'PLATFORM_FEE'
    )),
    CONSTRAINT chk_journal_balanced CHECK (total_debit = total_credit AND total_debit > 0),
    CONSTRAINT chk_journal_voided CHECK (
        (status = 'POSTED' AND voided_at IS NULL AND reversed_by_entry_id IS NULL)
        OR (status = 'VOIDED' AND voided_at IS NOT NULL AND reversed_by_entry_id IS NOT NULL)
    ),
    UNIQUE (tenant_id, entry_number),
    UNIQUE (tenant_id, sequence)
);

-- One posting per business source id
CREATE UNIQUE INDEX uq_journal_source ON journal_entries(tenant_id, source_id)
    WHERE source_type NOT IN ('MANUAL', 'REVERSAL');

-- An entry is reversed at most once
CREATE UNIQUE INDEX uq_journal_reverses ON journal_entries(reverses_entry_id)
    WHERE reverses_entry_id IS NOT NULL;

CREATE INDEX idx_journal_tenant_date ON journal_entries(tenant_id, entry_date DESC, sequence DESC);
CREATE INDEX idx_journal_tenant_period ON journal_entries(tenant_id, period_code);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    journal_entry_id UUID NOT NULL REFERENCES journal_entries(id),
    line_number INTEGER NOT NULL,
    account_code VARCHAR(20) NOT NULL,
    debit_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    description TEXT,
    CONSTRAINT chk_line_debit_or_credit CHECK (
        (debit_amount > 0 AND credit_amount = 0) OR (debit_amount = 0 AND credit_amount > 0)
    ),
    CONSTRAINT fk_line_account FOREIGN KEY (tenant_id, account_code)
        REFERENCES ledger_accounts(tenant_id, code),
    UNIQUE (journal_entry_id, line_number)
);

CREATE INDEX idx_journal_lines_entry ON journal_lines(journal_entry_id);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS journal_sequences CASCADE;
DROP TABLE IF EXISTS financial_periods CASCADE;
DROP TABLE IF EXISTS ledger_accounts CASCADE;
";

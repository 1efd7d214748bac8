//! Append-only guards.
//!
//! Wallet ledger entries, journal lines and idempotency records reject
//! UPDATE and DELETE. Journal entries may only move POSTED → VOIDED, and
//! VOIDED entries are frozen.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(APPEND_ONLY_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRY_GUARD_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const APPEND_ONLY_SQL: &str = r"
CREATE OR REPLACE FUNCTION reject_append_only_change()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% is append-only: % rejected', TG_TABLE_NAME, TG_OP;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_wallet_ledger_entries_append_only
BEFORE UPDATE OR DELETE ON wallet_ledger_entries
FOR EACH ROW
EXECUTE FUNCTION reject_append_only_change();

CREATE TRIGGER trg_journal_lines_append_only
BEFORE UPDATE OR DELETE ON journal_lines
FOR EACH ROW
EXECUTE FUNCTION reject_append_only_change();

CREATE TRIGGER trg_idempotency_records_append_only
BEFORE UPDATE OR DELETE ON idempotency_records
FOR EACH ROW
EXECUTE FUNCTION reject_append_only_change();
";

const JOURNAL_ENTRY_GUARD_SQL: &str = r"
CREATE OR REPLACE FUNCTION guard_journal_entry_change()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'Journal entries cannot be deleted. Void with a reversal instead.';
    END IF;

    IF OLD.status = 'VOIDED' THEN
        RAISE EXCEPTION 'Cannot modify voided journal entry %', OLD.entry_number;
    END IF;

    IF NEW.status <> 'VOIDED' THEN
        RAISE EXCEPTION 'Posted journal entry % is immutable. Void with a reversal instead.', OLD.entry_number;
    END IF;

    -- Voiding may only fill in the void columns
    IF (NEW.id, NEW.tenant_id, NEW.entry_number, NEW.sequence, NEW.entry_date, NEW.period_code,
        NEW.description, NEW.source_type, NEW.source_id, NEW.event_id, NEW.reverses_entry_id,
        NEW.total_debit, NEW.total_credit, NEW.created_by, NEW.created_at)
       IS DISTINCT FROM
       (OLD.id, OLD.tenant_id, OLD.entry_number, OLD.sequence, OLD.entry_date, OLD.period_code,
        OLD.description, OLD.source_type, OLD.source_id, OLD.event_id, OLD.reverses_entry_id,
        OLD.total_debit, OLD.total_credit, OLD.created_by, OLD.created_at) THEN
        RAISE EXCEPTION 'Voiding journal entry % may not alter posted columns', OLD.entry_number;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_journal_entries_guard
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION guard_journal_entry_change();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_journal_entries_guard ON journal_entries;
DROP TRIGGER IF EXISTS trg_idempotency_records_append_only ON idempotency_records;
DROP TRIGGER IF EXISTS trg_journal_lines_append_only ON journal_lines;
DROP TRIGGER IF EXISTS trg_wallet_ledger_entries_append_only ON wallet_ledger_entries;
DROP FUNCTION IF EXISTS guard_journal_entry_change();
DROP FUNCTION IF EXISTS reject_append_only_change();
";

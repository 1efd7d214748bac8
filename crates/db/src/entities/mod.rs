//! `SeaORM` entity definitions.
//!
//! Enum-valued columns are stored as TEXT guarded by CHECK constraints and
//! parsed into the `coffer-core` enums by the repositories.

pub mod financial_periods;
pub mod idempotency_records;
pub mod journal_entries;
pub mod journal_lines;
pub mod journal_sequences;
pub mod ledger_accounts;
pub mod wallet_ledger_entries;
pub mod wallets;

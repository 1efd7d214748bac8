//! Read-only integrity checks over posted entries.

use coffer_shared::types::JournalEntryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{JournalEntry, JournalTotals};

/// Result of checking one journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Entry checked.
    pub entry_id: JournalEntryId,
    /// Recomputed Σ debit.
    pub total_debit: Decimal,
    /// Recomputed Σ credit.
    pub total_credit: Decimal,
    /// Whether recomputed debits equal credits.
    pub is_balanced: bool,
    /// Whether the stored header totals match the lines.
    pub header_totals_match: bool,
    /// Lines with both or neither side set.
    pub malformed_lines: Vec<i32>,
    /// Account codes that no longer resolve.
    pub missing_accounts: Vec<String>,
    /// True when every check passed.
    pub is_valid: bool,
}

/// Recomputes the totals of `entry` and checks its account references.
pub fn verify_entry<F>(entry: &JournalEntry, account_exists: F) -> IntegrityReport
where
    F: Fn(&str) -> bool,
{
    let totals = JournalTotals::of_lines(&entry.lines);
    let header_totals_match =
        totals.total_debit == entry.total_debit && totals.total_credit == entry.total_credit;

    let malformed_lines: Vec<i32> = entry
        .lines
        .iter()
        .filter(|l| (l.debit_amount > Decimal::ZERO) == (l.credit_amount > Decimal::ZERO))
        .map(|l| l.line_number)
        .collect();

    let mut missing_accounts: Vec<String> = entry
        .lines
        .iter()
        .filter(|l| !account_exists(&l.account_code))
        .map(|l| l.account_code.clone())
        .collect();
    missing_accounts.sort();
    missing_accounts.dedup();

    let is_valid = totals.is_balanced
        && header_totals_match
        && entry.lines.len() >= 2
        && malformed_lines.is_empty()
        && missing_accounts.is_empty();

    IntegrityReport {
        entry_id: entry.id,
        total_debit: totals.total_debit,
        total_credit: totals.total_credit,
        is_balanced: totals.is_balanced,
        header_totals_match,
        malformed_lines,
        missing_accounts,
        is_valid,
    }
}

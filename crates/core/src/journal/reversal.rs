//! Reversal of posted journal entries.
//!
//! Voiding never edits the original lines; it posts a mirror entry with
//! every debit turned into a credit and vice versa.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::service::EntryHeader;
use super::types::{JournalEntry, JournalLineInput, SourceType};
use coffer_shared::types::UserId;

/// Reversal plan for a voided entry.
#[derive(Debug, Clone)]
pub struct ReversalPlan {
    /// Header of the reversing entry.
    pub header: EntryHeader,
    /// Mirrored lines.
    pub lines: Vec<JournalLineInput>,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Create reversing lines by swapping debits and credits.
    ///
    /// For each original line:
    /// - Debits become credits
    /// - Credits become debits
    /// - Account and amount are preserved
    /// - Description is prefixed with "Reversal: "
    #[must_use]
    pub fn reversing_lines(original: &JournalEntry) -> Vec<JournalLineInput> {
        original
            .lines
            .iter()
            .map(|line| JournalLineInput {
                account_code: line.account_code.clone(),
                debit_amount: line.credit_amount,
                credit_amount: line.debit_amount,
                description: Some(format!(
                    "Reversal: {}",
                    line.description.clone().unwrap_or_default()
                )),
            })
            .collect()
    }

    /// Builds the reversal plan for `original`, dated `entry_date`.
    #[must_use]
    pub fn plan(
        original: &JournalEntry,
        reason: &str,
        entry_date: NaiveDate,
        voided_by: Option<UserId>,
    ) -> ReversalPlan {
        ReversalPlan {
            header: EntryHeader {
                tenant_id: original.tenant_id,
                entry_date,
                description: format!(
                    "Reversal of {}. Reason: {}",
                    original.entry_number,
                    reason.trim()
                ),
                source_type: SourceType::Reversal,
                source_id: Some(original.id.to_string()),
                event_id: None,
                reverses_entry_id: Some(original.id),
                created_by: voided_by,
            },
            lines: Self::reversing_lines(original),
        }
    }

    /// Validate that original lines are balanced.
    ///
    /// This should always be true for posted entries.
    #[must_use]
    pub fn validate_reversal(original: &JournalEntry) -> bool {
        let total_debit: Decimal = original.lines.iter().map(|l| l.debit_amount).sum();
        let total_credit: Decimal = original.lines.iter().map(|l| l.credit_amount).sum();

        total_debit == total_credit
    }

    /// Returns true if `reversal` mirrors every line of `original`.
    #[must_use]
    pub fn is_mirror(original: &JournalEntry, reversal: &JournalEntry) -> bool {
        original.lines.len() == reversal.lines.len()
            && original.lines.iter().zip(&reversal.lines).all(|(o, r)| {
                o.account_code == r.account_code
                    && o.debit_amount == r.credit_amount
                    && o.credit_amount == r.debit_amount
            })
    }
}

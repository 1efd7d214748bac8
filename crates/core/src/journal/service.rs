//! Journal service for entry validation and posting plans.
//!
//! This module provides the core business logic for validating journal
//! entries and building them before they are committed by a store.

use chrono::{DateTime, NaiveDate, Utc};
use coffer_shared::types::{JournalEntryId, MAX_AMOUNT_SCALE, TenantId, UserId};
use rust_decimal::Decimal;

use super::account::{AccountInfo, balance_change};
use super::error::JournalError;
use super::types::{
    JournalEntry, JournalLine, JournalLineInput, JournalStatus, JournalTotals, LineSide,
    SourceType,
};
use crate::period::PeriodCode;

/// Header fields of an entry about to be posted.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Header description.
    pub description: String,
    /// Origin of the entry.
    pub source_type: SourceType,
    /// Business source id.
    pub source_id: Option<String>,
    /// External event id.
    pub event_id: Option<String>,
    /// Entry being reversed.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// Who posts it.
    pub created_by: Option<UserId>,
}

/// Effect of one posted line on one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDelta {
    /// Account code.
    pub account_code: String,
    /// Line side.
    pub side: LineSide,
    /// Line amount.
    pub amount: Decimal,
    /// Signed change to the account's normal-side balance.
    pub balance_change: Decimal,
}

/// Journal service for validation and posting plans.
///
/// This service contains pure business logic with no storage dependencies.
pub struct JournalService;

impl JournalService {
    /// Validate and resolve journal lines before posting.
    ///
    /// Steps, first failure wins:
    /// 1. At least 2 lines
    /// 2. Each line has exactly one positive side
    /// 3. Each account exists and is active
    /// 4. Σ debit == Σ credit
    ///
    /// The period gate is applied by the caller, after this succeeds.
    ///
    /// # Arguments
    ///
    /// * `lines` - The requested lines
    /// * `account_lookup` - Resolves an account code to its validation info
    ///
    /// # Errors
    ///
    /// Returns `JournalError` if validation fails.
    pub fn validate_lines<A>(
        lines: &[JournalLineInput],
        account_lookup: A,
    ) -> Result<(Vec<JournalLine>, JournalTotals), JournalError>
    where
        A: Fn(&str) -> Option<AccountInfo>,
    {
        Self::validate_lines_with(lines, account_lookup, true)
    }

    /// Validates reversal lines; inactive accounts are accepted so that
    /// deactivating an account never blocks a void.
    ///
    /// # Errors
    ///
    /// Returns `JournalError` if validation fails.
    pub fn validate_reversal_lines<A>(
        lines: &[JournalLineInput],
        account_lookup: A,
    ) -> Result<(Vec<JournalLine>, JournalTotals), JournalError>
    where
        A: Fn(&str) -> Option<AccountInfo>,
    {
        Self::validate_lines_with(lines, account_lookup, false)
    }

    fn validate_lines_with<A>(
        lines: &[JournalLineInput],
        account_lookup: A,
        require_active: bool,
    ) -> Result<(Vec<JournalLine>, JournalTotals), JournalError>
    where
        A: Fn(&str) -> Option<AccountInfo>,
    {
        // 1. Validate minimum lines
        if lines.len() < 2 {
            return Err(JournalError::MinLinesRequired);
        }

        // 2-3. Resolve each line
        let mut resolved = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            let line_number = index + 1;
            Self::validate_line_amounts(line, line_number)?;

            let code = line.account_code.trim();
            let account = account_lookup(code)
                .ok_or_else(|| JournalError::AccountNotFound(code.to_string()))?;
            if require_active && !account.is_active {
                return Err(JournalError::AccountInactive(code.to_string()));
            }

            resolved.push(JournalLine {
                line_number: i32::try_from(line_number).map_err(|_| JournalError::InvalidLine {
                    line_number,
                    reason: "too many lines".to_string(),
                })?,
                account_code: code.to_string(),
                debit_amount: line.debit_amount,
                credit_amount: line.credit_amount,
                description: line.description.clone(),
            });
        }

        // 4. Calculate totals and validate balance
        let totals = JournalTotals::of_lines(&resolved);
        if !totals.is_balanced {
            return Err(JournalError::UnbalancedEntry {
                debit: totals.total_debit,
                credit: totals.total_credit,
            });
        }

        Ok((resolved, totals))
    }

    fn validate_line_amounts(
        line: &JournalLineInput,
        line_number: usize,
    ) -> Result<(), JournalError> {
        let invalid = |reason: &str| JournalError::InvalidLine {
            line_number,
            reason: reason.to_string(),
        };

        if line.account_code.trim().is_empty() {
            return Err(invalid("account code is required"));
        }
        if line.debit_amount < Decimal::ZERO || line.credit_amount < Decimal::ZERO {
            return Err(invalid("amounts cannot be negative"));
        }
        let has_debit = line.debit_amount > Decimal::ZERO;
        let has_credit = line.credit_amount > Decimal::ZERO;
        if has_debit == has_credit {
            return Err(invalid("exactly one of debit or credit must be set"));
        }
        let amount = if has_debit { line.debit_amount } else { line.credit_amount };
        if amount.normalize().scale() > MAX_AMOUNT_SCALE {
            return Err(invalid("amount has too many decimal places"));
        }
        Ok(())
    }

    /// Builds a POSTED entry from validated lines.
    #[must_use]
    pub fn build_entry(
        header: EntryHeader,
        lines: Vec<JournalLine>,
        totals: JournalTotals,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        JournalEntry {
            id: JournalEntryId::new(),
            tenant_id: header.tenant_id,
            entry_number: JournalEntry::format_entry_number(sequence),
            entry_date: header.entry_date,
            period_code: PeriodCode::from_date(header.entry_date),
            description: header.description,
            source_type: header.source_type,
            source_id: header.source_id,
            event_id: header.event_id,
            reverses_entry_id: header.reverses_entry_id,
            reversed_by_entry_id: None,
            status: JournalStatus::Posted,
            void_reason: None,
            voided_at: None,
            voided_by: None,
            total_debit: totals.total_debit,
            total_credit: totals.total_credit,
            lines,
            created_by: header.created_by,
            created_at: now,
        }
    }

    /// Per-line account effects of a posted entry.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if a line's account is not resolvable.
    pub fn account_deltas<A>(
        entry: &JournalEntry,
        account_lookup: A,
    ) -> Result<Vec<AccountDelta>, JournalError>
    where
        A: Fn(&str) -> Option<AccountInfo>,
    {
        entry
            .lines
            .iter()
            .map(|line| {
                let account = account_lookup(&line.account_code)
                    .ok_or_else(|| JournalError::AccountNotFound(line.account_code.clone()))?;
                let side = line.side();
                let amount = line.amount();
                Ok(AccountDelta {
                    account_code: line.account_code.clone(),
                    side,
                    amount,
                    balance_change: balance_change(account.normal_side, side, amount),
                })
            })
            .collect()
    }

    /// Validate that an entry can be voided.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `AlreadyVoided` or `CannotVoidReversal`.
    pub fn validate_can_void(entry: &JournalEntry, reason: &str) -> Result<(), JournalError> {
        if reason.trim().is_empty() {
            return Err(JournalError::ReasonRequired);
        }
        if entry.status == JournalStatus::Voided {
            return Err(JournalError::AlreadyVoided(entry.id));
        }
        if entry.is_reversal() {
            return Err(JournalError::CannotVoidReversal(entry.id));
        }
        Ok(())
    }

    /// Marks `original` as voided by `reversal`.
    pub fn mark_voided(
        original: &mut JournalEntry,
        reversal: &JournalEntry,
        reason: &str,
        voided_by: Option<UserId>,
        now: DateTime<Utc>,
    ) {
        original.status = JournalStatus::Voided;
        original.void_reason = Some(reason.trim().to_string());
        original.voided_at = Some(now);
        original.voided_by = voided_by;
        original.reversed_by_entry_id = Some(reversal.id);
    }
}

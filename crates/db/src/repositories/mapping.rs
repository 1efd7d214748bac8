//! Row ↔ domain conversions.

use chrono::{DateTime, FixedOffset, Utc};
use coffer_core::journal::{JournalEntry, JournalLine, LedgerAccount};
use coffer_core::period::FinancialPeriod;
use coffer_core::wallet::{LedgerEntry, Wallet};
use coffer_shared::types::{
    JournalEntryId, LedgerAccountId, LedgerEntryId, TenantId, UserId, WalletId,
};
use sea_orm::Set;
use uuid::Uuid;

use super::error::{RepositoryError, parse_column};
use crate::entities::{
    financial_periods, journal_entries, journal_lines, ledger_accounts, wallet_ledger_entries,
    wallets,
};

fn utc(value: DateTime<FixedOffset>) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

fn fixed(value: DateTime<Utc>) -> DateTime<FixedOffset> {
    value.into()
}

// ========== Wallets ==========

pub(crate) fn wallet_from_model(model: wallets::Model) -> Result<Wallet, RepositoryError> {
    Ok(Wallet {
        id: WalletId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        wallet_type: parse_column("wallet_type", &model.wallet_type)?,
        customer_id: model.customer_id,
        vendor_id: model.vendor_id,
        currency: parse_column("currency", &model.currency)?,
        status: parse_column("status", &model.status)?,
        balance: model.balance,
        pending_balance: model.pending_balance,
        last_sequence: model.last_sequence,
        version: model.version,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn wallet_active_model(wallet: &Wallet) -> wallets::ActiveModel {
    wallets::ActiveModel {
        id: Set(wallet.id.into_inner()),
        tenant_id: Set(wallet.tenant_id.into_inner()),
        wallet_type: Set(wallet.wallet_type.as_str().to_string()),
        customer_id: Set(wallet.customer_id.clone()),
        vendor_id: Set(wallet.vendor_id.clone()),
        currency: Set(wallet.currency.to_string()),
        status: Set(wallet.status.as_str().to_string()),
        balance: Set(wallet.balance),
        pending_balance: Set(wallet.pending_balance),
        last_sequence: Set(wallet.last_sequence),
        version: Set(wallet.version),
        created_at: Set(fixed(wallet.created_at)),
        updated_at: Set(fixed(wallet.updated_at)),
    }
}

pub(crate) fn entry_from_model(
    model: wallet_ledger_entries::Model,
) -> Result<LedgerEntry, RepositoryError> {
    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        wallet_id: WalletId::from_uuid(model.wallet_id),
        sequence: model.sequence,
        entry_type: parse_column("entry_type", &model.entry_type)?,
        amount: model.amount,
        pending_delta: model.pending_delta,
        hold_id: model.hold_id,
        idempotency_key: model.idempotency_key,
        description: model.description,
        reference_type: model.reference_type,
        reference_id: model.reference_id,
        balance_after: model.balance_after,
        pending_after: model.pending_after,
        created_at: utc(model.created_at),
    })
}

pub(crate) fn entry_active_model(entry: &LedgerEntry) -> wallet_ledger_entries::ActiveModel {
    wallet_ledger_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        tenant_id: Set(entry.tenant_id.into_inner()),
        wallet_id: Set(entry.wallet_id.into_inner()),
        sequence: Set(entry.sequence),
        entry_type: Set(entry.entry_type.as_str().to_string()),
        amount: Set(entry.amount),
        pending_delta: Set(entry.pending_delta),
        hold_id: Set(entry.hold_id.clone()),
        idempotency_key: Set(entry.idempotency_key.clone()),
        description: Set(entry.description.clone()),
        reference_type: Set(entry.reference_type.clone()),
        reference_id: Set(entry.reference_id.clone()),
        balance_after: Set(entry.balance_after),
        pending_after: Set(entry.pending_after),
        created_at: Set(fixed(entry.created_at)),
    }
}

// ========== Chart of accounts ==========

pub(crate) fn account_from_model(
    model: ledger_accounts::Model,
) -> Result<LedgerAccount, RepositoryError> {
    let category: coffer_core::journal::AccountCategory =
        parse_column("category", &model.category)?;
    Ok(LedgerAccount {
        id: LedgerAccountId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        code: model.code,
        name: model.name,
        category,
        normal_side: category.normal_side(),
        current_balance: model.current_balance,
        period_debit: model.period_debit,
        period_credit: model.period_credit,
        period_code: model
            .period_code
            .as_deref()
            .map(|code| parse_column("period_code", code))
            .transpose()?,
        is_active: model.is_active,
        version: model.version,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn account_active_model(account: &LedgerAccount) -> ledger_accounts::ActiveModel {
    ledger_accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        tenant_id: Set(account.tenant_id.into_inner()),
        code: Set(account.code.clone()),
        name: Set(account.name.clone()),
        category: Set(account.category.as_str().to_string()),
        current_balance: Set(account.current_balance),
        period_debit: Set(account.period_debit),
        period_credit: Set(account.period_credit),
        period_code: Set(account.period_code.map(|code| code.to_string())),
        is_active: Set(account.is_active),
        version: Set(account.version),
        created_at: Set(fixed(account.created_at)),
        updated_at: Set(fixed(account.updated_at)),
    }
}

// ========== Journal ==========

pub(crate) fn journal_entry_from_models(
    header: journal_entries::Model,
    mut lines: Vec<journal_lines::Model>,
) -> Result<JournalEntry, RepositoryError> {
    lines.sort_by_key(|line| line.line_number);
    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(header.id),
        tenant_id: TenantId::from_uuid(header.tenant_id),
        entry_number: header.entry_number,
        entry_date: header.entry_date,
        period_code: parse_column("period_code", &header.period_code)?,
        description: header.description,
        source_type: parse_column("source_type", &header.source_type)?,
        source_id: header.source_id,
        event_id: header.event_id,
        reverses_entry_id: header.reverses_entry_id.map(JournalEntryId::from_uuid),
        reversed_by_entry_id: header.reversed_by_entry_id.map(JournalEntryId::from_uuid),
        status: parse_column("status", &header.status)?,
        void_reason: header.void_reason,
        voided_at: header.voided_at.map(utc),
        voided_by: header.voided_by.map(UserId::from_uuid),
        total_debit: header.total_debit,
        total_credit: header.total_credit,
        lines: lines
            .into_iter()
            .map(|line| JournalLine {
                line_number: line.line_number,
                account_code: line.account_code,
                debit_amount: line.debit_amount,
                credit_amount: line.credit_amount,
                description: line.description,
            })
            .collect(),
        created_by: header.created_by.map(UserId::from_uuid),
        created_at: utc(header.created_at),
    })
}

pub(crate) fn journal_entry_active_model(
    entry: &JournalEntry,
    sequence: i64,
) -> journal_entries::ActiveModel {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        tenant_id: Set(entry.tenant_id.into_inner()),
        entry_number: Set(entry.entry_number.clone()),
        sequence: Set(sequence),
        entry_date: Set(entry.entry_date),
        period_code: Set(entry.period_code.to_string()),
        description: Set(entry.description.clone()),
        source_type: Set(entry.source_type.as_str().to_string()),
        source_id: Set(entry.source_id.clone()),
        event_id: Set(entry.event_id.clone()),
        reverses_entry_id: Set(entry.reverses_entry_id.map(JournalEntryId::into_inner)),
        reversed_by_entry_id: Set(entry.reversed_by_entry_id.map(JournalEntryId::into_inner)),
        status: Set(entry.status.as_str().to_string()),
        void_reason: Set(entry.void_reason.clone()),
        voided_at: Set(entry.voided_at.map(fixed)),
        voided_by: Set(entry.voided_by.map(UserId::into_inner)),
        total_debit: Set(entry.total_debit),
        total_credit: Set(entry.total_credit),
        created_by: Set(entry.created_by.map(UserId::into_inner)),
        created_at: Set(fixed(entry.created_at)),
    }
}

pub(crate) fn journal_line_active_models(entry: &JournalEntry) -> Vec<journal_lines::ActiveModel> {
    entry
        .lines
        .iter()
        .map(|line| journal_lines::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(entry.tenant_id.into_inner()),
            journal_entry_id: Set(entry.id.into_inner()),
            line_number: Set(line.line_number),
            account_code: Set(line.account_code.clone()),
            debit_amount: Set(line.debit_amount),
            credit_amount: Set(line.credit_amount),
            description: Set(line.description.clone()),
        })
        .collect()
}

// ========== Periods ==========

pub(crate) fn period_from_model(
    model: financial_periods::Model,
) -> Result<FinancialPeriod, RepositoryError> {
    Ok(FinancialPeriod {
        tenant_id: TenantId::from_uuid(model.tenant_id),
        code: parse_column("code", &model.code)?,
        status: parse_column("status", &model.status)?,
        start_date: model.start_date,
        end_date: model.end_date,
        closed_at: model.closed_at.map(utc),
        closed_by: model.closed_by.map(UserId::from_uuid),
        reopened_at: model.reopened_at.map(utc),
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn period_active_model(period: &FinancialPeriod) -> financial_periods::ActiveModel {
    financial_periods::ActiveModel {
        id: Set(Uuid::now_v7()),
        tenant_id: Set(period.tenant_id.into_inner()),
        code: Set(period.code.to_string()),
        status: Set(period.status.as_str().to_string()),
        start_date: Set(period.start_date),
        end_date: Set(period.end_date),
        closed_at: Set(period.closed_at.map(fixed)),
        closed_by: Set(period.closed_by.map(UserId::into_inner)),
        reopened_at: Set(period.reopened_at.map(fixed)),
        created_at: Set(fixed(period.created_at)),
        updated_at: Set(fixed(period.updated_at)),
    }
}

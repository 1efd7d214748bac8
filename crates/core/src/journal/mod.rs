//! Double-entry journal engine.
//!
//! This module implements:
//! - Chart of accounts with normal sides and running balances
//! - Journal line validation and the debit == credit invariant
//! - Event posting through an explicit template table
//! - Voiding by reversal, and integrity checks over posted entries

pub mod account;
pub mod error;
pub mod events;
pub mod integrity;
pub mod reversal;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use account::{
    AccountCategory, AccountInfo, AccountTemplate, DEFAULT_CHART, LedgerAccount, TrialBalance,
    TrialBalanceLine, balance_change, codes,
};
pub use error::JournalError;
pub use events::{
    AdjustmentDirection, EVENT_TEMPLATES, EventPayload, EventTemplate, EventType, PaymentMethod,
    lines_for_event, parse_payload, template_for,
};
pub use integrity::{IntegrityReport, verify_entry};
pub use reversal::{ReversalPlan, ReversalService};
pub use service::{AccountDelta, EntryHeader, JournalService};
pub use types::{
    EventPostingInput, JournalAction, JournalEntry, JournalEntryFilter, JournalLine,
    JournalLineInput, JournalStatus, JournalTotals, LineSide, ManualEntryInput, PostingResult,
    SourceType, VoidInput, VoidResult,
};

//! Wallets and the per-wallet ledger entry log.
//!
//! This module implements:
//! - Wallet identity, status and cached balances
//! - Immutable ledger entries with per-wallet sequences
//! - Hold bookkeeping and balance materialization
//! - Validation and planning of credit, debit, hold, release, capture and transfer

pub mod balance;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use balance::{HoldBook, HoldState, Reconciliation, WalletBalances, reconcile};
pub use error::WalletError;
pub use service::{AppliedEntry, WalletService};
pub use types::{
    EntryFamily, HoldInput, LedgerEntry, MovementInput, TransferInput, TransferResult, Wallet,
    WalletAction, WalletEntryType, WalletFilter, WalletIdentity, WalletOperationResult,
    WalletOwner, WalletSnapshot, WalletStatus, WalletType,
};

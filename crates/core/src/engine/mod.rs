//! Embedded single-node ledger engine.
//!
//! Keeps wallets, journal books and periods in memory and serializes every
//! mutation behind per-wallet and per-tenant locks. The PostgreSQL
//! repositories in `coffer-db` implement the same operations with row locks;
//! this engine is what embedded callers and the test suite run against.
//!
//! # Locking
//!
//! - One `tokio::sync::Mutex` per wallet. Transfers lock both wallets in
//!   ascending `WalletId` order.
//! - One `tokio::sync::Mutex` per tenant journal book (accounts + entries).
//! - One `tokio::sync::RwLock` per tenant period table. Postings hold the
//!   read guard while committing; close and reopen take the write guard.
//!
//! Lock order is always wallet(s) → book → periods.

mod journal;
mod periods;
mod wallets;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use coffer_shared::config::LedgerConfig;
use coffer_shared::types::{JournalEntryId, TenantId, WalletId};
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use crate::journal::{JournalEntry, LedgerAccount};
use crate::period::{FinancialPeriod, PeriodCode};
use crate::wallet::{HoldBook, LedgerEntry, Wallet, WalletIdentity};

/// Mutable state of one wallet.
#[derive(Debug)]
struct WalletState {
    wallet: Wallet,
    entries: Vec<LedgerEntry>,
    holds: HoldBook,
}

/// A wallet and the tenant it belongs to.
///
/// The tenant is immutable, so it can be checked without taking the lock.
#[derive(Debug)]
struct WalletSlot {
    tenant_id: TenantId,
    state: Mutex<WalletState>,
}

/// Chart of accounts and posted entries of one tenant.
#[derive(Debug, Default)]
struct TenantBook {
    accounts: BTreeMap<String, LedgerAccount>,
    entries: Vec<JournalEntry>,
    index: HashMap<JournalEntryId, usize>,
    by_source: HashMap<String, JournalEntryId>,
    next_number: u64,
}

type PeriodTable = BTreeMap<PeriodCode, FinancialPeriod>;

/// In-memory ledger engine.
pub struct LedgerEngine {
    config: LedgerConfig,
    idempotency: Arc<dyn IdempotencyStore>,
    wallets: DashMap<WalletId, Arc<WalletSlot>>,
    identities: DashMap<WalletIdentity, WalletId>,
    books: DashMap<TenantId, Arc<Mutex<TenantBook>>>,
    periods: DashMap<TenantId, Arc<RwLock<PeriodTable>>>,
}

impl LedgerEngine {
    /// Creates an engine with an injected idempotency store.
    #[must_use]
    pub fn new(config: LedgerConfig, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            config,
            idempotency,
            wallets: DashMap::new(),
            identities: DashMap::new(),
            books: DashMap::new(),
            periods: DashMap::new(),
        }
    }

    /// Creates an engine backed by [`MemoryIdempotencyStore`].
    #[must_use]
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(config, Arc::new(MemoryIdempotencyStore::new()))
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn book(&self, tenant_id: TenantId) -> Arc<Mutex<TenantBook>> {
        self.books.entry(tenant_id).or_default().value().clone()
    }

    fn period_table(&self, tenant_id: TenantId) -> Arc<RwLock<PeriodTable>> {
        self.periods.entry(tenant_id).or_default().value().clone()
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::in_memory(LedgerConfig::default())
    }
}

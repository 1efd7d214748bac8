//! Balance materialization over the wallet ledger.
//!
//! The ledger entry log is the source of truth. Everything here folds
//! entries in sequence order; cached wallet balances are checked against it.

use std::collections::BTreeMap;

use coffer_shared::types::WalletId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{LedgerEntry, Wallet, WalletEntryType};

/// Balances derived from a wallet's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletBalances {
    /// Σ amount of balance-affecting entries.
    pub balance: Decimal,
    /// Σ pending deltas, i.e. open holds.
    pub pending_balance: Decimal,
    /// Highest sequence seen.
    pub last_sequence: i64,
    /// Number of entries folded.
    pub entry_count: usize,
}

impl WalletBalances {
    /// Folds entries in sequence order.
    #[must_use]
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| e.sequence);

        ordered.into_iter().fold(Self::default(), |mut acc, entry| {
            acc.balance += entry.amount;
            acc.pending_balance += entry.pending_delta;
            acc.last_sequence = acc.last_sequence.max(entry.sequence);
            acc.entry_count += 1;
            acc
        })
    }

    /// `balance - pending_balance`.
    #[must_use]
    pub fn available_balance(&self) -> Decimal {
        self.balance - self.pending_balance
    }
}

/// Lifecycle of a single hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldState {
    /// Caller-supplied hold id.
    pub hold_id: String,
    /// Amount reserved at creation.
    pub held: Decimal,
    /// Terminating entry type, once released or captured.
    pub terminated_by: Option<WalletEntryType>,
    /// Amount released or captured by the terminating entry.
    pub settled_amount: Decimal,
}

impl HoldState {
    /// Returns true while the hold still reserves funds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.terminated_by.is_none()
    }
}

/// All holds of one wallet, keyed by hold id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldBook {
    holds: BTreeMap<String, HoldState>,
}

impl HoldBook {
    /// Rebuilds the hold book from `HOLD_*` entries.
    #[must_use]
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| e.sequence);

        let mut book = Self::default();
        for entry in ordered {
            book.record(entry);
        }
        book
    }

    /// Applies one entry. Non-hold entries are ignored.
    pub fn record(&mut self, entry: &LedgerEntry) {
        let Some(hold_id) = entry.hold_id.as_deref() else {
            return;
        };

        match entry.entry_type {
            WalletEntryType::HoldCreated => {
                self.holds.insert(
                    hold_id.to_string(),
                    HoldState {
                        hold_id: hold_id.to_string(),
                        held: entry.pending_delta,
                        terminated_by: None,
                        settled_amount: Decimal::ZERO,
                    },
                );
            }
            WalletEntryType::HoldReleased | WalletEntryType::HoldCaptured => {
                if let Some(hold) = self.holds.get_mut(hold_id) {
                    hold.terminated_by = Some(entry.entry_type);
                    hold.settled_amount = if entry.entry_type == WalletEntryType::HoldCaptured {
                        -entry.amount
                    } else {
                        hold.held
                    };
                }
            }
            _ => {}
        }
    }

    /// Looks up a hold by id.
    #[must_use]
    pub fn get(&self, hold_id: &str) -> Option<&HoldState> {
        self.holds.get(hold_id)
    }

    /// Number of open holds.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.holds.values().filter(|h| h.is_open()).count()
    }

    /// Σ of open hold amounts.
    #[must_use]
    pub fn open_total(&self) -> Decimal {
        self.holds
            .values()
            .filter(|h| h.is_open())
            .map(|h| h.held)
            .sum()
    }
}

/// Outcome of recomputing a wallet's balances from its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// The wallet checked.
    pub wallet_id: WalletId,
    /// Cached balance before repair.
    pub cached_balance: Decimal,
    /// Cached pending balance before repair.
    pub cached_pending_balance: Decimal,
    /// Balance folded from entries.
    pub computed_balance: Decimal,
    /// Pending balance folded from entries.
    pub computed_pending_balance: Decimal,
    /// `computed - cached` for balance.
    pub balance_discrepancy: Decimal,
    /// `computed - cached` for pending balance.
    pub pending_discrepancy: Decimal,
    /// Entries folded.
    pub entries_counted: usize,
    /// Sequences are 1..=n without gaps.
    pub sequence_contiguous: bool,
    /// Every entry's `balance_after`/`pending_after` matches the running fold.
    pub running_totals_consistent: bool,
    /// True when the cache was overwritten with computed values.
    pub repaired: bool,
}

impl Reconciliation {
    /// Returns true if the cached balances matched the log.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.balance_discrepancy == Decimal::ZERO && self.pending_discrepancy == Decimal::ZERO
    }
}

/// Compares a wallet's cached balances with its entry log.
///
/// `repaired` is left false; callers that overwrite the cache set it.
#[must_use]
pub fn reconcile(wallet: &Wallet, entries: &[LedgerEntry]) -> Reconciliation {
    let computed = WalletBalances::from_entries(entries);

    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);

    let mut sequence_contiguous = true;
    let mut running_totals_consistent = true;
    let mut balance = Decimal::ZERO;
    let mut pending = Decimal::ZERO;
    for (expected, entry) in (1_i64..).zip(&ordered) {
        if entry.sequence != expected {
            sequence_contiguous = false;
        }
        balance += entry.amount;
        pending += entry.pending_delta;
        if entry.balance_after != balance || entry.pending_after != pending {
            running_totals_consistent = false;
        }
    }

    Reconciliation {
        wallet_id: wallet.id,
        cached_balance: wallet.balance,
        cached_pending_balance: wallet.pending_balance,
        computed_balance: computed.balance,
        computed_pending_balance: computed.pending_balance,
        balance_discrepancy: computed.balance - wallet.balance,
        pending_discrepancy: computed.pending_balance - wallet.pending_balance,
        entries_counted: computed.entry_count,
        sequence_contiguous,
        running_totals_consistent,
        repaired: false,
    }
}

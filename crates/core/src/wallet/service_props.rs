//! Property-based tests for WalletService.
//!
//! - Property 1: Balance equals the fold of balance-affecting entries
//! - Property 2: Pending balance equals the sum of open holds
//! - Property 3: Available balance never goes negative through holds
//! - Property 4: Rejected operations leave the wallet untouched

use chrono::Utc;
use coffer_shared::types::{CurrencyCode, TenantId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::{HoldBook, WalletBalances, reconcile};
use super::service::WalletService;
use super::types::{
    HoldInput, LedgerEntry, MovementInput, Wallet, WalletAction, WalletEntryType, WalletIdentity,
    WalletOwner,
};

/// One randomly generated wallet operation.
#[derive(Debug, Clone)]
enum Op {
    Credit(Decimal),
    Debit(Decimal),
    Hold(u8, Decimal),
    Release(u8, Decimal),
    Capture(u8, Decimal),
}

/// Strategy to generate positive decimal amounts (0.01 to 1,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate operations over a small set of hold ids.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        positive_amount().prop_map(Op::Credit),
        positive_amount().prop_map(Op::Debit),
        (0u8..4, positive_amount()).prop_map(|(h, a)| Op::Hold(h, a)),
        (0u8..4, positive_amount()).prop_map(|(h, a)| Op::Release(h, a)),
        (0u8..4, positive_amount()).prop_map(|(h, a)| Op::Capture(h, a)),
    ]
}

fn new_wallet() -> Wallet {
    let identity = WalletIdentity {
        tenant_id: TenantId::new(),
        owner: WalletOwner::Customer("cust-1".to_string()),
        currency: CurrencyCode::parse("USD").unwrap_or_else(|e| panic!("{e}")),
    };
    Wallet::open(&identity, Utc::now())
}

fn hold_input(hold: u8, amount: Decimal) -> HoldInput {
    HoldInput {
        amount,
        hold_id: format!("h{hold}"),
        idempotency_key: None,
        description: None,
    }
}

/// Runs the operations, keeping only successful ones, like a committing caller.
fn run(ops: &[Op]) -> (Wallet, Vec<LedgerEntry>, usize) {
    let mut wallet = new_wallet();
    let mut entries = Vec::new();
    let mut holds = HoldBook::default();
    let mut rejected = 0;

    for (i, op) in ops.iter().enumerate() {
        let now = Utc::now();
        let result = match op {
            Op::Credit(amount) => WalletService::plan_credit(
                &wallet,
                &MovementInput {
                    amount: *amount,
                    entry_type: WalletEntryType::CreditSaleProceeds,
                    idempotency_key: format!("k{i}"),
                    description: None,
                    reference_type: None,
                    reference_id: None,
                },
                now,
            ),
            Op::Debit(amount) => WalletService::plan_debit(
                &wallet,
                &MovementInput {
                    amount: *amount,
                    entry_type: WalletEntryType::DebitPayout,
                    idempotency_key: format!("k{i}"),
                    description: None,
                    reference_type: None,
                    reference_id: None,
                },
                now,
            ),
            Op::Hold(h, amount) => {
                WalletService::plan_hold(&wallet, &holds, &hold_input(*h, *amount), now)
            }
            Op::Release(h, amount) => WalletService::plan_hold_action(
                &wallet,
                &holds,
                WalletAction::Release,
                &hold_input(*h, *amount),
                now,
            ),
            Op::Capture(h, amount) => WalletService::plan_hold_action(
                &wallet,
                &holds,
                WalletAction::Capture,
                &hold_input(*h, *amount),
                now,
            ),
        };

        match result {
            Ok(applied) => {
                holds.record(&applied.entry);
                entries.push(applied.entry);
                wallet = applied.wallet;
            }
            Err(_) => rejected += 1,
        }
    }

    (wallet, entries, rejected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Balance equals the fold of balance-affecting entries**
    ///
    /// *For any* sequence of wallet operations, the cached balance SHALL equal
    /// the sum of CREDIT_*, DEBIT_* and HOLD_CAPTURED entry amounts.
    #[test]
    fn prop_balance_matches_entries(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (wallet, entries, _) = run(&ops);

        let from_types: Decimal = entries
            .iter()
            .filter(|e| e.entry_type.affects_balance())
            .map(|e| e.amount)
            .sum();
        prop_assert_eq!(wallet.balance, from_types);

        let report = reconcile(&wallet, &entries);
        prop_assert!(report.is_consistent());
        prop_assert!(report.sequence_contiguous);
        prop_assert!(report.running_totals_consistent);
    }

    /// **Property 2: Pending balance equals the sum of open holds**
    #[test]
    fn prop_pending_matches_open_holds(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (wallet, entries, _) = run(&ops);
        let holds = HoldBook::from_entries(&entries);
        prop_assert_eq!(wallet.pending_balance, holds.open_total());
        prop_assert_eq!(
            WalletBalances::from_entries(&entries).pending_balance,
            holds.open_total()
        );
    }

    /// **Property 3: Available balance never goes negative through holds**
    ///
    /// Debits may take the balance below open holds; every accepted hold
    /// leaves available balance >= 0 at the time it is created.
    #[test]
    fn prop_hold_keeps_available_non_negative(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (_, entries, _) = run(&ops);
        for entry in entries.iter().filter(|e| e.entry_type == WalletEntryType::HoldCreated) {
            prop_assert!(entry.balance_after - entry.pending_after >= Decimal::ZERO);
        }
        for entry in &entries {
            prop_assert!(entry.balance_after >= Decimal::ZERO);
        }
    }

    /// **Property 4: Rejected operations leave the wallet untouched**
    #[test]
    fn prop_rejections_do_not_mutate(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (wallet, entries, rejected) = run(&ops);
        prop_assert_eq!(entries.len() + rejected, ops.len());
        prop_assert_eq!(usize::try_from(wallet.last_sequence).unwrap_or(usize::MAX), entries.len());
        prop_assert_eq!(wallet.version, 1 + wallet.last_sequence);
    }
}

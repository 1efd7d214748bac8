//! Engine tests: end-to-end scenarios and concurrency.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use coffer_shared::config::LedgerConfig;
use coffer_shared::types::{JournalEntryId, PageRequest, TenantId, WalletId};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::Barrier;

use super::LedgerEngine;
use crate::idempotency::{IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore};
use crate::journal::{
    EventPostingInput, JournalEntryFilter, JournalError, JournalLineInput, JournalStatus,
    ManualEntryInput, ReversalService, SourceType, VoidInput, codes,
};
use crate::period::{PeriodCode, PeriodError, PeriodStatus};
use crate::wallet::{
    HoldInput, MovementInput, TransferInput, Wallet, WalletEntryType, WalletError, WalletFilter,
    WalletStatus, WalletType,
};

fn movement(amount: Decimal, entry_type: WalletEntryType, key: &str) -> MovementInput {
    MovementInput {
        amount,
        entry_type,
        idempotency_key: key.to_string(),
        description: None,
        reference_type: None,
        reference_id: None,
    }
}

fn hold(amount: Decimal, hold_id: &str) -> HoldInput {
    HoldInput {
        amount,
        hold_id: hold_id.to_string(),
        idempotency_key: None,
        description: None,
    }
}

fn transfer(from: WalletId, to: WalletId, amount: Decimal, key: &str) -> TransferInput {
    TransferInput {
        from_wallet_id: from,
        to_wallet_id: to,
        amount,
        idempotency_key: key.to_string(),
        debit_entry_type: None,
        credit_entry_type: None,
        description: None,
        reference_type: None,
        reference_id: None,
    }
}

async fn customer_wallet(engine: &LedgerEngine, tenant: TenantId, customer: &str) -> Wallet {
    engine
        .get_or_create_wallet(tenant, WalletType::Customer, Some(customer), None, "USD")
        .await
        .unwrap()
        .0
}

async fn funded_wallet(
    engine: &LedgerEngine,
    tenant: TenantId,
    customer: &str,
    amount: Decimal,
) -> Wallet {
    let wallet = customer_wallet(engine, tenant, customer).await;
    engine
        .credit(
            tenant,
            wallet.id,
            movement(amount, WalletEntryType::CreditAdjustment, &format!("fund-{customer}")),
        )
        .await
        .unwrap();
    engine.get_wallet(tenant, wallet.id).await.unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn manual(entry_date: NaiveDate, lines: Vec<JournalLineInput>) -> ManualEntryInput {
    ManualEntryInput {
        entry_date,
        description: "Manual entry".to_string(),
        lines,
        created_by: None,
    }
}

fn cash_sale(amount: Decimal) -> Vec<JournalLineInput> {
    vec![
        JournalLineInput::debit(codes::CASH, amount),
        JournalLineInput::credit(codes::SALES, amount),
    ]
}

fn event(
    event_type: &str,
    event_id: &str,
    source_id: &str,
    payload: serde_json::Value,
) -> EventPostingInput {
    EventPostingInput {
        event_type: event_type.to_string(),
        event_id: event_id.to_string(),
        source_id: source_id.to_string(),
        entry_date: None,
        payload,
        created_by: None,
    }
}

async fn balance_of(engine: &LedgerEngine, tenant: TenantId, code: &str) -> Decimal {
    engine
        .list_accounts(tenant)
        .await
        .into_iter()
        .find(|a| a.code == code)
        .map_or(Decimal::ZERO, |a| a.current_balance)
}

/// Store that accepts lookups and fails every write.
struct FailingStore;

#[async_trait]
impl IdempotencyStore for FailingStore {
    async fn get(
        &self,
        _key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        Ok(None)
    }

    async fn put_if_absent(
        &self,
        _record: IdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        Err(IdempotencyError::Storage("disk full".to_string()))
    }
}

// ========== Wallet scenarios ==========

#[tokio::test]
async fn test_credit_hold_capture_replay_scenario() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = customer_wallet(&engine, tenant, "cust-1").await;
    assert_eq!(wallet.balance, Decimal::ZERO);

    let credit = engine
        .credit(tenant, wallet.id, movement(dec!(100), WalletEntryType::CreditRefund, "k1"))
        .await
        .unwrap();
    assert!(!credit.is_duplicate);
    assert_eq!(credit.wallet.balance, dec!(100));

    let held = engine.hold(tenant, wallet.id, hold(dec!(40), "h1")).await.unwrap();
    assert_eq!(held.wallet.pending_balance, dec!(40));
    assert_eq!(held.wallet.available_balance, dec!(60));

    let captured = engine.capture(tenant, wallet.id, hold(dec!(40), "h1")).await.unwrap();
    assert_eq!(captured.wallet.balance, dec!(60));
    assert_eq!(captured.wallet.pending_balance, Decimal::ZERO);

    let replay = engine
        .credit(tenant, wallet.id, movement(dec!(100), WalletEntryType::CreditRefund, "k1"))
        .await
        .unwrap();
    assert!(replay.is_duplicate);
    assert_eq!(replay.entry, credit.entry);
    assert_eq!(replay.wallet, credit.wallet);

    let current = engine.get_wallet(tenant, wallet.id).await.unwrap();
    assert_eq!(current.balance, dec!(60));

    let entries = engine
        .list_wallet_entries(tenant, wallet.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(entries.meta.total, 3);
    let sequences: Vec<i64> = entries.data.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_get_or_create_is_keyed_on_identity() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();

    let (first, created) = engine
        .get_or_create_wallet(tenant, WalletType::Vendor, None, Some("v-1"), "usd")
        .await
        .unwrap();
    assert!(created);
    let (second, created) = engine
        .get_or_create_wallet(tenant, WalletType::Vendor, None, Some(" v-1 "), "USD")
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);

    let (eur, _) = engine
        .get_or_create_wallet(tenant, WalletType::Vendor, None, Some("v-1"), "EUR")
        .await
        .unwrap();
    assert_ne!(eur.id, first.id);

    let (other_tenant, _) = engine
        .get_or_create_wallet(TenantId::new(), WalletType::Vendor, None, Some("v-1"), "USD")
        .await
        .unwrap();
    assert_ne!(other_tenant.id, first.id);

    let found = engine
        .find_wallet(tenant, WalletType::Vendor, None, Some("v-1"), "USD")
        .await
        .unwrap();
    assert_eq!(found.map(|w| w.id), Some(first.id));
}

#[tokio::test]
async fn test_get_or_create_validates_owner_and_currency() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();

    let err = engine
        .get_or_create_wallet(tenant, WalletType::Customer, None, Some("v-1"), "USD")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_OWNER");

    let err = engine
        .get_or_create_wallet(tenant, WalletType::Platform, None, None, "DOLLARS")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURRENCY");
}

#[tokio::test]
async fn test_credit_validation_errors() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = customer_wallet(&engine, tenant, "c").await;

    let err = engine
        .credit(tenant, wallet.id, movement(dec!(10), WalletEntryType::DebitPayout, "k"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ENTRY_TYPE");

    let err = engine
        .credit(tenant, wallet.id, movement(dec!(0), WalletEntryType::CreditRefund, "k"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_AMOUNT");

    let err = engine
        .credit(tenant, wallet.id, movement(dec!(10), WalletEntryType::CreditRefund, " "))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "IDEMPOTENCY_KEY_REQUIRED");

    let err = engine
        .credit(TenantId::new(), wallet.id, movement(dec!(10), WalletEntryType::CreditRefund, "k"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::WalletNotFound(id) if id == wallet.id));

    let unchanged = engine.get_wallet(tenant, wallet.id).await.unwrap();
    assert_eq!(unchanged.version, 1);
}

#[tokio::test]
async fn test_frozen_wallet_rejects_movements() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(50)).await;

    engine
        .set_wallet_status(tenant, wallet.id, WalletStatus::Frozen)
        .await
        .unwrap();
    let err = engine
        .debit(tenant, wallet.id, movement(dec!(10), WalletEntryType::DebitPayout, "d1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "WALLET_NOT_ACTIVE");
    assert_eq!(err.http_status_code(), 422);

    engine
        .set_wallet_status(tenant, wallet.id, WalletStatus::Active)
        .await
        .unwrap();
    let ok = engine
        .debit(tenant, wallet.id, movement(dec!(10), WalletEntryType::DebitPayout, "d1"))
        .await
        .unwrap();
    assert_eq!(ok.wallet.balance, dec!(40));
}

#[tokio::test]
async fn test_debit_is_gated_by_balance_not_holds() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(100)).await;
    engine.hold(tenant, wallet.id, hold(dec!(80), "h1")).await.unwrap();

    let debit = engine
        .debit(tenant, wallet.id, movement(dec!(90), WalletEntryType::DebitPayout, "d1"))
        .await
        .unwrap();
    assert_eq!(debit.wallet.balance, dec!(10));

    let err = engine
        .debit(tenant, wallet.id, movement(dec!(11), WalletEntryType::DebitPayout, "d2"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientBalance { balance, requested }
            if balance == dec!(10) && requested == dec!(11)
    ));
}

#[tokio::test]
async fn test_hold_release_lifecycle() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(100)).await;

    let err = engine
        .hold(tenant, wallet.id, hold(dec!(101), "h1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_AVAILABLE_BALANCE");

    engine.hold(tenant, wallet.id, hold(dec!(70), "h1")).await.unwrap();
    let released = engine.release(tenant, wallet.id, hold(dec!(70), "h1")).await.unwrap();
    assert_eq!(released.wallet.balance, dec!(100));
    assert_eq!(released.wallet.available_balance, dec!(100));

    // Default keys make a repeated release a replay, not a second termination.
    let replay = engine.release(tenant, wallet.id, hold(dec!(70), "h1")).await.unwrap();
    assert!(replay.is_duplicate);

    let explicit = HoldInput {
        idempotency_key: Some("capture-after-release".to_string()),
        ..hold(dec!(10), "h1")
    };
    let err = engine.capture(tenant, wallet.id, explicit).await.unwrap_err();
    assert_eq!(err.error_code(), "HOLD_ALREADY_TERMINATED");

    let err = engine.release(tenant, wallet.id, hold(dec!(1), "nope")).await.unwrap_err();
    assert_eq!(err.error_code(), "HOLD_NOT_FOUND");

    let err = engine.hold(tenant, wallet.id, hold(dec!(1), " ")).await.unwrap_err();
    assert_eq!(err.error_code(), "HOLD_ID_REQUIRED");
}

#[tokio::test]
async fn test_transfer_moves_funds_and_replays() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let from = funded_wallet(&engine, tenant, "a", dec!(100)).await;
    let to = customer_wallet(&engine, tenant, "b").await;

    let result = engine
        .transfer(tenant, transfer(from.id, to.id, dec!(30), "t1"))
        .await
        .unwrap();
    assert_eq!(result.from_wallet.balance, dec!(70));
    assert_eq!(result.to_wallet.balance, dec!(30));
    assert_eq!(result.debit_entry.entry_type, WalletEntryType::DebitPayout);
    assert_eq!(result.credit_entry.entry_type, WalletEntryType::CreditAdjustment);

    let replay = engine
        .transfer(tenant, transfer(from.id, to.id, dec!(30), "t1"))
        .await
        .unwrap();
    assert!(replay.is_duplicate);
    assert_eq!(replay.from_wallet, result.from_wallet);
    assert_eq!(replay.to_wallet, result.to_wallet);

    assert_eq!(engine.get_wallet(tenant, from.id).await.unwrap().balance, dec!(70));
    assert_eq!(engine.get_wallet(tenant, to.id).await.unwrap().balance, dec!(30));

    let adjusted = engine
        .credit(tenant, to.id, movement(dec!(5), WalletEntryType::CreditAdjustment, "t1"))
        .await
        .unwrap();
    assert!(!adjusted.is_duplicate);
    assert_eq!(adjusted.wallet.balance, dec!(35));
    assert_eq!(result.credit_entry.idempotency_key, "transfer:t1");
}

#[tokio::test]
async fn test_rejected_transfer_changes_nothing() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let from = funded_wallet(&engine, tenant, "a", dec!(100)).await;
    let to = customer_wallet(&engine, tenant, "b").await;
    let (eur, _) = engine
        .get_or_create_wallet(tenant, WalletType::Customer, Some("a"), None, "EUR")
        .await
        .unwrap();

    let err = engine
        .transfer(tenant, transfer(from.id, from.id, dec!(1), "t"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SAME_WALLET");

    let err = engine
        .transfer(tenant, transfer(from.id, eur.id, dec!(1), "t"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CURRENCY_MISMATCH");

    engine
        .set_wallet_status(tenant, to.id, WalletStatus::Frozen)
        .await
        .unwrap();
    let err = engine
        .transfer(tenant, transfer(from.id, to.id, dec!(1), "t"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "WALLET_NOT_ACTIVE");

    engine
        .set_wallet_status(tenant, to.id, WalletStatus::Active)
        .await
        .unwrap();
    let err = engine
        .transfer(tenant, transfer(from.id, to.id, dec!(500), "t"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");

    let from_after = engine.get_wallet(tenant, from.id).await.unwrap();
    let to_after = engine.get_wallet(tenant, to.id).await.unwrap();
    assert_eq!(from_after.balance, dec!(100));
    assert_eq!(from_after.last_sequence, 1);
    assert_eq!(to_after.balance, Decimal::ZERO);
    assert_eq!(to_after.last_sequence, 0);
}

#[tokio::test]
async fn test_transfer_is_atomic_when_store_fails() {
    let engine = LedgerEngine::new(LedgerConfig::default(), Arc::new(FailingStore));
    let tenant = TenantId::new();
    let from = customer_wallet(&engine, tenant, "a").await;
    let to = customer_wallet(&engine, tenant, "b").await;

    // Seed the balance directly; every write through the store fails.
    {
        let slot = engine.wallets.get(&from.id).unwrap().value().clone();
        let mut state = slot.state.lock().await;
        state.wallet.balance = dec!(100);
    }

    let err = engine
        .transfer(tenant, transfer(from.id, to.id, dec!(40), "t1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STORAGE_ERROR");

    let from_after = engine.get_wallet(tenant, from.id).await.unwrap();
    let to_after = engine.get_wallet(tenant, to.id).await.unwrap();
    assert_eq!(from_after.balance, dec!(100));
    assert_eq!(to_after.balance, Decimal::ZERO);
    assert_eq!(from_after.last_sequence + to_after.last_sequence, 0);
}

#[tokio::test]
async fn test_close_wallet_requires_zero_balance() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(5)).await;

    let err = engine
        .set_wallet_status(tenant, wallet.id, WalletStatus::Closed)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "WALLET_NOT_EMPTY");

    engine
        .debit(tenant, wallet.id, movement(dec!(5), WalletEntryType::DebitPayout, "d"))
        .await
        .unwrap();
    let closed = engine
        .set_wallet_status(tenant, wallet.id, WalletStatus::Closed)
        .await
        .unwrap();
    assert_eq!(closed.status, WalletStatus::Closed);

    let err = engine
        .set_wallet_status(tenant, wallet.id, WalletStatus::Active)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
}

#[tokio::test]
async fn test_recalculate_repairs_diverged_cache() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(100)).await;
    engine.hold(tenant, wallet.id, hold(dec!(25), "h")).await.unwrap();

    let clean = engine.recalculate_balance(tenant, wallet.id).await.unwrap();
    assert!(clean.is_consistent());
    assert!(!clean.repaired);

    {
        let slot = engine.wallets.get(&wallet.id).unwrap().value().clone();
        let mut state = slot.state.lock().await;
        state.wallet.balance = dec!(999);
    }

    let report = engine.recalculate_balance(tenant, wallet.id).await.unwrap();
    assert_eq!(report.balance_discrepancy, dec!(-899));
    assert_eq!(report.computed_pending_balance, dec!(25));
    assert!(report.repaired);
    assert!(report.sequence_contiguous);
    assert!(report.running_totals_consistent);
    assert_eq!(engine.get_wallet(tenant, wallet.id).await.unwrap().balance, dec!(100));
}

#[tokio::test]
async fn test_list_wallets_filters_by_tenant_and_type() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    customer_wallet(&engine, tenant, "a").await;
    customer_wallet(&engine, tenant, "b").await;
    engine
        .get_or_create_wallet(tenant, WalletType::Platform, None, None, "USD")
        .await
        .unwrap();
    customer_wallet(&engine, TenantId::new(), "a").await;

    let all = engine
        .list_wallets(tenant, &WalletFilter::default(), PageRequest::default())
        .await;
    assert_eq!(all.meta.total, 3);

    let filter = WalletFilter {
        wallet_type: Some(WalletType::Customer),
        ..WalletFilter::default()
    };
    let page = engine.list_wallets(tenant, &filter, PageRequest::new(1, 1)).await;
    assert_eq!(page.meta.total, 2);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.data.len(), 1);
}

// ========== Wallet concurrency ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let engine = Arc::new(LedgerEngine::default());
    let tenant = TenantId::new();
    let wallet = funded_wallet(&engine, tenant, "c", dec!(100)).await;
    let barrier = Arc::new(Barrier::new(10));

    let tasks = (0..10).map(|i| {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            engine
                .debit(
                    tenant,
                    wallet.id,
                    movement(dec!(20), WalletEntryType::DebitPayout, &format!("d{i}")),
                )
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 5);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.error_code() == "INSUFFICIENT_BALANCE"));

    let after = engine.get_wallet(tenant, wallet.id).await.unwrap();
    assert_eq!(after.balance, Decimal::ZERO);
    assert!(engine.recalculate_balance(tenant, wallet.id).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_apply_once() {
    let engine = Arc::new(LedgerEngine::default());
    let tenant = TenantId::new();
    let wallet = customer_wallet(&engine, tenant, "c").await;
    let barrier = Arc::new(Barrier::new(8));

    let tasks = (0..8).map(|_| {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            engine
                .credit(
                    tenant,
                    wallet.id,
                    movement(dec!(15), WalletEntryType::CreditSaleProceeds, "order-1"),
                )
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| !r.is_duplicate).count(), 1);
    assert!(results.windows(2).all(|w| w[0].entry.id == w[1].entry.id));
    let after = engine.get_wallet(tenant, wallet.id).await.unwrap();
    assert_eq!(after.balance, dec!(15));
    assert_eq!(after.last_sequence, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    let engine = Arc::new(LedgerEngine::default());
    let tenant = TenantId::new();
    let a = funded_wallet(&engine, tenant, "a", dec!(1000)).await;
    let b = funded_wallet(&engine, tenant, "b", dec!(1000)).await;

    let tasks = (0..40).map(|i| {
        let engine = Arc::clone(&engine);
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        tokio::spawn(async move {
            engine
                .transfer(tenant, transfer(from, to, dec!(10), &format!("t{i}")))
                .await
        })
    });
    let results = tokio::time::timeout(std::time::Duration::from_secs(10), join_all(tasks))
        .await
        .expect("transfers deadlocked");
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

    let a_after = engine.get_wallet(tenant, a.id).await.unwrap();
    let b_after = engine.get_wallet(tenant, b.id).await.unwrap();
    assert_eq!(a_after.balance + b_after.balance, dec!(2000));
    assert_eq!(a_after.balance, dec!(1000));
}

// ========== Journal scenarios ==========

#[tokio::test]
async fn test_manual_entry_posts_and_unbalanced_is_rejected() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();

    let posted = engine
        .post_manual_entry(tenant, manual(date(2025, 1, 10), cash_sale(dec!(5000))))
        .await
        .unwrap();
    assert_eq!(posted.entry.status, JournalStatus::Posted);
    assert_eq!(posted.entry.total_debit, dec!(5000));
    assert_eq!(posted.entry.total_credit, dec!(5000));
    assert_eq!(posted.entry.entry_number, "JE-000001");

    let err = engine
        .post_manual_entry(
            tenant,
            manual(
                date(2025, 1, 11),
                vec![
                    JournalLineInput::debit(codes::CASH, dec!(10000)),
                    JournalLineInput::credit(codes::SALES, dec!(5000)),
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNBALANCED_ENTRY");

    assert_eq!(balance_of(&engine, tenant, codes::CASH).await, dec!(5000));
    assert_eq!(balance_of(&engine, tenant, codes::SALES).await, dec!(5000));
    assert!(engine.trial_balance(tenant).await.is_balanced);
}

#[tokio::test]
async fn test_manual_entry_line_errors() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();

    let err = engine
        .post_manual_entry(
            tenant,
            manual(date(2025, 1, 1), vec![JournalLineInput::debit(codes::CASH, dec!(1))]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MIN_LINES_REQUIRED");

    let err = engine
        .post_manual_entry(
            tenant,
            manual(
                date(2025, 1, 1),
                vec![
                    JournalLineInput::debit("9999", dec!(1)),
                    JournalLineInput::credit(codes::SALES, dec!(1)),
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");

    engine.set_account_active(tenant, codes::SALES, false).await.unwrap();
    let err = engine
        .post_manual_entry(tenant, manual(date(2025, 1, 1), cash_sale(dec!(1))))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_INACTIVE");
}

#[tokio::test]
async fn test_period_gating_close_and_reopen() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let code: PeriodCode = "2025-02".parse().unwrap();

    let closed = engine.close_period(tenant, code, None).await.unwrap();
    assert_eq!(closed.status, PeriodStatus::Closed);

    let err = engine
        .post_manual_entry(tenant, manual(date(2025, 2, 14), cash_sale(dec!(10))))
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::Period(PeriodError::PeriodClosed(c)) if c == code));
    assert_eq!(balance_of(&engine, tenant, codes::CASH).await, Decimal::ZERO);

    let err = engine.close_period(tenant, code, None).await.unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_ALREADY_CLOSED");

    engine.reopen_period(tenant, code).await.unwrap();
    engine
        .post_manual_entry(tenant, manual(date(2025, 2, 14), cash_sale(dec!(10))))
        .await
        .unwrap();

    let err = engine.reopen_period(tenant, code).await.unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_ALREADY_OPEN");

    let err = engine
        .reopen_period(tenant, "2030-01".parse().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_NOT_FOUND");
}

#[tokio::test]
async fn test_closing_does_not_touch_posted_entries() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let posted = engine
        .post_manual_entry(tenant, manual(date(2025, 3, 3), cash_sale(dec!(75))))
        .await
        .unwrap();

    engine
        .close_period(tenant, "2025-03".parse().unwrap(), None)
        .await
        .unwrap();
    let after = engine.get_entry(tenant, posted.entry.id).await.unwrap();
    assert_eq!(after, posted.entry);
    assert_eq!(balance_of(&engine, tenant, codes::CASH).await, dec!(75));
}

#[tokio::test]
async fn test_current_period_is_created_open() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let current = engine.current_period(tenant).await;
    assert_eq!(current.code, PeriodCode::current(Utc::now()));
    assert!(current.is_open());
    assert_eq!(engine.list_periods(tenant).await.len(), 1);
}

#[tokio::test]
async fn test_void_creates_mirror_and_blocks_second_void() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let today = Utc::now().date_naive();
    let posted = engine
        .post_manual_entry(
            tenant,
            manual(
                today,
                vec![
                    JournalLineInput::debit(codes::CASH, dec!(110)),
                    JournalLineInput::credit(codes::SALES, dec!(100)),
                    JournalLineInput::credit(codes::TAX_PAYABLE, dec!(10)),
                ],
            ),
        )
        .await
        .unwrap()
        .entry;

    let err = engine
        .void_entry(tenant, posted.id, VoidInput { reason: "  ".into(), voided_by: None })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "REASON_REQUIRED");

    let voided = engine
        .void_entry(tenant, posted.id, VoidInput { reason: "Duplicate".into(), voided_by: None })
        .await
        .unwrap();
    assert_eq!(voided.original.status, JournalStatus::Voided);
    assert_eq!(voided.original.reversed_by_entry_id, Some(voided.reversal.id));
    assert_eq!(voided.reversal.source_type, SourceType::Reversal);
    assert_eq!(voided.reversal.reverses_entry_id, Some(posted.id));
    assert!(ReversalService::is_mirror(&posted, &voided.reversal));

    for code in [codes::CASH, codes::SALES, codes::TAX_PAYABLE] {
        assert_eq!(balance_of(&engine, tenant, code).await, Decimal::ZERO);
    }

    let err = engine
        .void_entry(tenant, posted.id, VoidInput { reason: "again".into(), voided_by: None })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_VOIDED");

    let err = engine
        .void_entry(
            tenant,
            voided.reversal.id,
            VoidInput { reason: "undo".into(), voided_by: None },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CANNOT_VOID_REVERSAL");

    let err = engine
        .void_entry(
            tenant,
            JournalEntryId::new(),
            VoidInput { reason: "x".into(), voided_by: None },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_void_into_closed_current_period_is_rejected() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let posted = engine
        .post_manual_entry(tenant, manual(date(2024, 6, 1), cash_sale(dec!(20))))
        .await
        .unwrap()
        .entry;

    let current = engine.current_period(tenant).await;
    engine.close_period(tenant, current.code, None).await.unwrap();

    let err = engine
        .void_entry(tenant, posted.id, VoidInput { reason: "late".into(), voided_by: None })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_CLOSED");
    assert_eq!(
        engine.get_entry(tenant, posted.id).await.unwrap().status,
        JournalStatus::Posted
    );
}

#[tokio::test]
async fn test_event_posting_is_idempotent_by_source_id() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let payload = json!({ "gross_amount": "110.00", "tax_amount": "10.00" });

    let first = engine
        .post_event(tenant, event("POS_SALE", "evt-1", "sale-42", payload.clone()))
        .await
        .unwrap();
    assert!(!first.is_duplicate);
    assert_eq!(first.entry.source_type.as_str(), "POS_SALE");
    assert_eq!(first.entry.lines.len(), 3);

    let second = engine
        .post_event(tenant, event("POS_SALE", "evt-2", "sale-42", payload))
        .await
        .unwrap();
    assert!(second.is_duplicate);
    assert_eq!(second.entry, first.entry);
    assert_eq!(second.entry.event_id.as_deref(), Some("evt-1"));

    let listed = engine
        .list_entries(tenant, &JournalEntryFilter::default(), PageRequest::default())
        .await;
    assert_eq!(listed.meta.total, 1);
    assert_eq!(balance_of(&engine, tenant, codes::CASH).await, dec!(110.00));

    let looked_up = engine.lookup_by_source(tenant, "sale-42").await.unwrap();
    assert_eq!(looked_up.id, first.entry.id);

    let err = engine.lookup_by_source(tenant, "sale-404").await.unwrap_err();
    assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_event_posting_rejections() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let payload = json!({ "gross_amount": "10.00" });

    let err = engine
        .post_event(tenant, event("PAYROLL", "e", "s", payload.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_EVENT_TYPE");

    let err = engine
        .post_event(tenant, event("POS_SALE", "e", " ", payload.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SOURCE_ID_REQUIRED");

    let err = engine
        .post_event(tenant, event("POS_SALE", "e", "s", json!({ "gross_amount": "nope" })))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PAYLOAD");

    let err = engine
        .post_event(tenant, event("INVENTORY_ADJUSTMENT", "e", "s", payload))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PAYLOAD");

    // Nothing was recorded, so the source id is still free.
    assert!(engine.lookup_by_source(tenant, "s").await.is_err());
}

#[tokio::test]
async fn test_event_into_closed_period_can_post_after_reopen() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let code: PeriodCode = "2025-05".parse().unwrap();
    engine.close_period(tenant, code, None).await.unwrap();

    let mut input = event("VENDOR_PAYOUT", "e1", "payout-1", json!({ "amount": "50" }));
    input.entry_date = Some(date(2025, 5, 20));
    let err = engine.post_event(tenant, input.clone()).await.unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_CLOSED");

    engine.reopen_period(tenant, code).await.unwrap();
    let posted = engine.post_event(tenant, input).await.unwrap();
    assert!(!posted.is_duplicate);
    assert_eq!(posted.entry.period_code, code);
}

#[tokio::test]
async fn test_verify_integrity_and_trial_balance() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let posted = engine
        .post_event(
            tenant,
            event(
                "SVM_ORDER",
                "e1",
                "order-1",
                json!({ "gross_amount": "120.00", "tax_amount": "20.00", "platform_fee": "5.00" }),
            ),
        )
        .await
        .unwrap()
        .entry;

    let report = engine.verify_integrity(tenant, posted.id).await.unwrap();
    assert!(report.is_valid);
    assert_eq!(report.total_debit, dec!(120.00));

    let trial = engine.trial_balance(tenant).await;
    assert!(trial.is_balanced);
    assert_eq!(trial.total_debit, dec!(120.00));
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let engine = LedgerEngine::default();
    let tenant = TenantId::new();
    let first = engine.seed_chart_of_accounts(tenant).await;
    let second = engine.seed_chart_of_accounts(tenant).await;
    assert_eq!(first.len(), crate::journal::DEFAULT_CHART.len());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_without_auto_seed_accounts_are_missing() {
    let config = LedgerConfig {
        seed_chart_on_first_use: false,
        ..LedgerConfig::default()
    };
    let engine = LedgerEngine::in_memory(config);
    let tenant = TenantId::new();
    let err = engine
        .post_manual_entry(tenant, manual(date(2025, 1, 1), cash_sale(dec!(1))))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
}

// ========== Journal concurrency ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_event_replays_post_once() {
    let engine = Arc::new(LedgerEngine::default());
    let tenant = TenantId::new();
    let barrier = Arc::new(Barrier::new(6));

    let tasks = (0..6).map(|i| {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            engine
                .post_event(
                    tenant,
                    event(
                        "REFUND",
                        &format!("evt-{i}"),
                        "refund-7",
                        json!({ "gross_amount": "30" }),
                    ),
                )
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| !r.is_duplicate).count(), 1);
    let listed = engine
        .list_entries(tenant, &JournalEntryFilter::default(), PageRequest::default())
        .await;
    assert_eq!(listed.meta.total, 1);
    assert!(engine.trial_balance(tenant).await.is_balanced);
}

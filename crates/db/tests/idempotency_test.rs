//! PostgreSQL idempotency store tests.
//!
//! These tests require a running PostgreSQL database.

mod common;

use coffer_core::idempotency::{
    IdempotencyKey, IdempotencyRecord, IdempotencyScope, IdempotencyStore,
};
use coffer_db::PgIdempotencyStore;
use coffer_shared::types::{TenantId, WalletId};
use serde_json::json;

#[tokio::test]
async fn test_first_write_wins() {
    let Some(db) = common::setup().await else { return };
    let store = PgIdempotencyStore::new(db);
    let key = IdempotencyKey::for_tenant(TenantId::new(), IdempotencyScope::EventPosting, "sale-1");

    assert!(store.get(&key).await.unwrap().is_none());

    let first = IdempotencyRecord::new(key.clone(), &json!({ "entry": 1 })).unwrap();
    assert!(store.put_if_absent(first).await.unwrap().is_none());

    let second = IdempotencyRecord::new(key.clone(), &json!({ "entry": 2 })).unwrap();
    let existing = store.put_if_absent(second).await.unwrap().unwrap();
    assert_eq!(existing.response, json!({ "entry": 1 }));

    let stored = store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.key, key);
    assert_eq!(stored.response, json!({ "entry": 1 }));
}

#[tokio::test]
async fn test_keys_are_scoped() {
    let Some(db) = common::setup().await else { return };
    let store = PgIdempotencyStore::new(db);
    let tenant = TenantId::new();
    let wallet_a = WalletId::new();
    let wallet_b = WalletId::new();

    let on_a = IdempotencyKey::for_wallet(tenant, IdempotencyScope::WalletCredit, wallet_a, "k1");
    store
        .put_if_absent(IdempotencyRecord::new(on_a.clone(), &json!("a")).unwrap())
        .await
        .unwrap();

    let on_b = IdempotencyKey::for_wallet(tenant, IdempotencyScope::WalletCredit, wallet_b, "k1");
    let as_debit =
        IdempotencyKey::for_wallet(tenant, IdempotencyScope::WalletDebit, wallet_a, "k1");
    let other_tenant =
        IdempotencyKey::for_wallet(TenantId::new(), IdempotencyScope::WalletCredit, wallet_a, "k1");

    assert!(store.get(&on_b).await.unwrap().is_none());
    assert!(store.get(&as_debit).await.unwrap().is_none());
    assert!(store.get(&other_tenant).await.unwrap().is_none());
    assert_eq!(store.get(&on_a).await.unwrap().unwrap().key.wallet_id, Some(wallet_a));
}

//! Journal and period repository integration tests.
//!
//! These tests require a running PostgreSQL database.

mod common;

use chrono::{NaiveDate, Utc};
use coffer_core::journal::{
    EventPostingInput, JournalEntryFilter, JournalLineInput, JournalStatus, ManualEntryInput,
    SourceType, VoidInput, codes,
};
use coffer_core::period::{PeriodCode, PeriodStatus};
use coffer_db::entities::journal_lines;
use coffer_db::{JournalRepository, PeriodRepository};
use coffer_shared::types::{PageRequest, TenantId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde_json::json;

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

fn pos_sale(event_id: &str, source_id: &str) -> EventPostingInput {
    EventPostingInput {
        event_type: "POS_SALE".to_string(),
        event_id: event_id.to_string(),
        source_id: source_id.to_string(),
        entry_date: None,
        payload: json!({ "gross_amount": "110.00", "tax_amount": "10.00" }),
        created_by: None,
    }
}

async fn balance_of(repo: &JournalRepository, tenant: TenantId, code: &str) -> Decimal {
    repo.list_accounts(tenant)
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.code == code)
        .map_or(Decimal::ZERO, |a| a.current_balance)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::test]
async fn test_manual_entry_posts_and_updates_balances() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db, common::ledger_config());
    let tenant = TenantId::new();

    let posted = repo
        .post_manual_entry(tenant, manual(today(), cash_sale(dec!(250))))
        .await
        .unwrap();
    assert_eq!(posted.entry.entry_number, "JE-000001");
    assert_eq!(posted.entry.status, JournalStatus::Posted);
    assert_eq!(balance_of(&repo, tenant, codes::CASH).await, dec!(250));
    assert_eq!(balance_of(&repo, tenant, codes::SALES).await, dec!(250));

    let second = repo
        .post_manual_entry(tenant, manual(today(), cash_sale(dec!(5))))
        .await
        .unwrap();
    assert_eq!(second.entry.entry_number, "JE-000002");

    let loaded = repo.get_entry(tenant, posted.entry.id).await.unwrap();
    assert_eq!(loaded.id, posted.entry.id);
    assert_eq!(loaded.lines, posted.entry.lines);
    assert_eq!(loaded.total_credit, dec!(250));

    let tb = repo.trial_balance(tenant).await.unwrap();
    assert!(tb.is_balanced);
    assert_eq!(tb.total_debit, dec!(255));
}

#[tokio::test]
async fn test_unbalanced_and_unknown_account_rejected() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db, common::ledger_config());
    let tenant = TenantId::new();

    let err = repo
        .post_manual_entry(
            tenant,
            manual(
                today(),
                vec![
                    JournalLineInput::debit(codes::CASH, dec!(10)),
                    JournalLineInput::credit(codes::SALES, dec!(9)),
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNBALANCED_ENTRY");

    let err = repo
        .post_manual_entry(
            tenant,
            manual(
                today(),
                vec![
                    JournalLineInput::debit("9999", dec!(10)),
                    JournalLineInput::credit(codes::SALES, dec!(10)),
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");

    let page = repo
        .list_entries(tenant, &JournalEntryFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.meta.total, 0);
}

#[tokio::test]
async fn test_closed_period_rejects_postings_until_reopened() {
    let Some(db) = common::setup().await else { return };
    let config = common::ledger_config();
    let journal = JournalRepository::new(db.clone(), config.clone());
    let periods = PeriodRepository::new(db, config);
    let tenant = TenantId::new();
    let january = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let code = PeriodCode::from_date(january);

    let closed = periods.close_period(tenant, code, None).await.unwrap();
    assert_eq!(closed.status, PeriodStatus::Closed);

    let err = journal
        .post_manual_entry(tenant, manual(january, cash_sale(dec!(1))))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_CLOSED");

    let err = periods.close_period(tenant, code, None).await.unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_ALREADY_CLOSED");

    periods.reopen_period(tenant, code).await.unwrap();
    journal
        .post_manual_entry(tenant, manual(january, cash_sale(dec!(1))))
        .await
        .unwrap();

    let listed = periods.list_periods(tenant).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].reopened_at.is_some());
}

#[tokio::test]
async fn test_event_posting_is_idempotent_by_source_id() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db, common::ledger_config());
    let tenant = TenantId::new();

    let first = repo.post_event(tenant, pos_sale("evt-1", "sale-1")).await.unwrap();
    assert!(!first.is_duplicate);
    assert_eq!(first.entry.source_type.as_str(), "POS_SALE");

    let second = repo.post_event(tenant, pos_sale("evt-2", "sale-1")).await.unwrap();
    assert!(second.is_duplicate);
    assert_eq!(second.entry.id, first.entry.id);

    let found = repo.lookup_by_source(tenant, "sale-1").await.unwrap();
    assert_eq!(found.id, first.entry.id);

    let err = repo.lookup_by_source(tenant, "missing").await.unwrap_err();
    assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");

    let page = repo
        .list_entries(tenant, &JournalEntryFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.meta.total, 1);
}

#[tokio::test]
async fn test_void_posts_mirror_entry() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db, common::ledger_config());
    let tenant = TenantId::new();

    let posted = repo
        .post_manual_entry(tenant, manual(today(), cash_sale(dec!(40))))
        .await
        .unwrap()
        .entry;
    let void = VoidInput {
        reason: "Duplicate".to_string(),
        voided_by: None,
    };

    let result = repo.void_entry(tenant, posted.id, void.clone()).await.unwrap();
    assert_eq!(result.original.status, JournalStatus::Voided);
    assert_eq!(result.original.reversed_by_entry_id, Some(result.reversal.id));
    assert_eq!(result.reversal.source_type, SourceType::Reversal);
    assert_eq!(result.reversal.reverses_entry_id, Some(posted.id));
    assert_eq!(balance_of(&repo, tenant, codes::CASH).await, Decimal::ZERO);

    let err = repo.void_entry(tenant, posted.id, void.clone()).await.unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_VOIDED");

    let err = repo
        .void_entry(tenant, result.reversal.id, void)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CANNOT_VOID_REVERSAL");

    let stored = repo.get_entry(tenant, posted.id).await.unwrap();
    assert_eq!(stored.status, JournalStatus::Voided);
    assert_eq!(stored.void_reason.as_deref(), Some("Duplicate"));

    let report = repo.verify_integrity(tenant, posted.id).await.unwrap();
    assert!(report.is_valid);
}

#[tokio::test]
async fn test_posted_lines_cannot_be_changed() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db.clone(), common::ledger_config());
    let tenant = TenantId::new();

    let posted = repo
        .post_manual_entry(tenant, manual(today(), cash_sale(dec!(12))))
        .await
        .unwrap()
        .entry;

    let update = db
        .execute_unprepared(&format!(
            "UPDATE journal_lines SET debit_amount = 13 WHERE journal_entry_id = '{}'",
            posted.id
        ))
        .await;
    assert!(update.is_err());

    let delete = journal_lines::Entity::delete_many()
        .filter(journal_lines::Column::JournalEntryId.eq(posted.id.into_inner()))
        .exec(&db)
        .await;
    assert!(delete.is_err());

    let stored = repo.get_entry(tenant, posted.id).await.unwrap();
    assert_eq!(stored.lines, posted.lines);
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let Some(db) = common::setup().await else { return };
    let repo = JournalRepository::new(db, common::ledger_config());
    let tenant = TenantId::new();

    let first = repo.seed_chart_of_accounts(tenant).await.unwrap();
    let second = repo.seed_chart_of_accounts(tenant).await.unwrap();
    assert!(!first.is_empty());
    assert_eq!(first.len(), second.len());

    let account = repo.set_account_active(tenant, codes::CASH, false).await.unwrap();
    assert!(!account.is_active);
    let err = repo
        .post_manual_entry(tenant, manual(today(), cash_sale(dec!(1))))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_INACTIVE");
}

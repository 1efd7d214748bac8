//! Property-based tests for journal validation, event templates and reversal.

use chrono::{NaiveDate, Utc};
use coffer_shared::types::TenantId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::account::{AccountInfo, DEFAULT_CHART, LedgerAccount, TrialBalance};
use super::events::{AdjustmentDirection, EventPayload, EventType, PaymentMethod, lines_for_event};
use super::reversal::ReversalService;
use super::service::{EntryHeader, JournalService};
use super::types::{JournalLineInput, SourceType};
use crate::period::PeriodCode;

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    // Generate amounts from 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to pick an account from the default chart.
fn account_code() -> impl Strategy<Value = &'static str> {
    (0..DEFAULT_CHART.len()).prop_map(|i| DEFAULT_CHART[i].code)
}

/// Strategy to generate a balanced set of lines (2-8 lines).
fn balanced_lines() -> impl Strategy<Value = Vec<JournalLineInput>> {
    prop::collection::vec((account_code(), account_code(), positive_amount()), 1..4).prop_map(
        |pairs| {
            pairs
                .into_iter()
                .flat_map(|(debit, credit, amount)| {
                    [
                        JournalLineInput::debit(debit, amount),
                        JournalLineInput::credit(credit, amount),
                    ]
                })
                .collect()
        },
    )
}

fn chart_lookup(code: &str) -> Option<AccountInfo> {
    DEFAULT_CHART.iter().find(|t| t.code == code).map(|t| AccountInfo {
        code: t.code.to_string(),
        is_active: true,
        normal_side: t.category.normal_side(),
    })
}

fn header() -> EntryHeader {
    EntryHeader {
        tenant_id: TenantId::new(),
        entry_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or_default(),
        description: "prop".to_string(),
        source_type: SourceType::Manual,
        source_id: None,
        event_id: None,
        reverses_entry_id: None,
        created_by: None,
    }
}

fn event_payload() -> impl Strategy<Value = (EventType, EventPayload)> {
    (
        prop::sample::select(EventType::ALL.to_vec()),
        positive_amount(),
        0u32..50,
        0u32..30,
        positive_amount(),
        prop::sample::select(vec![
            PaymentMethod::Cash,
            PaymentMethod::Bank,
            PaymentMethod::Card,
            PaymentMethod::Wallet,
        ]),
        any::<bool>(),
    )
        .prop_map(|(event_type, gross, tax_pct, fee_pct, cost, payment_method, up)| {
            let tax_amount = gross * Decimal::from(tax_pct) / Decimal::from(100);
            let platform_fee = gross * Decimal::from(fee_pct) / Decimal::from(100);
            let payload = EventPayload {
                gross_amount: gross,
                tax_amount,
                cost_amount: cost,
                platform_fee,
                payment_method,
                direction: Some(if up {
                    AdjustmentDirection::Increase
                } else {
                    AdjustmentDirection::Decrease
                }),
                memo: None,
            };
            (event_type, payload)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: Balanced entries validate.
    ///
    /// *For any* set of paired debit/credit lines on existing accounts,
    /// validation SHALL succeed with equal totals.
    #[test]
    fn prop_balanced_lines_validate(lines in balanced_lines()) {
        let (resolved, totals) = JournalService::validate_lines(&lines, chart_lookup)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(resolved.len(), lines.len());
        prop_assert!(totals.is_balanced);
        prop_assert_eq!(totals.difference(), Decimal::ZERO);
    }

    /// Property 2: Any imbalance is rejected.
    ///
    /// *For any* balanced set, adding a non-zero skew to one line SHALL make
    /// validation fail with UNBALANCED_ENTRY.
    #[test]
    fn prop_skewed_lines_rejected(mut lines in balanced_lines(), skew in positive_amount()) {
        lines[0].debit_amount += skew;
        let result = JournalService::validate_lines(&lines, chart_lookup);
        let unbalanced = matches!(
            result,
            Err(super::error::JournalError::UnbalancedEntry { .. })
        );
        prop_assert!(unbalanced);
    }

    /// Property 3: Every event template produces a postable entry.
    ///
    /// *For any* consistent payload, the template lines SHALL balance and
    /// resolve against the default chart.
    #[test]
    fn prop_event_templates_balance((event_type, payload) in event_payload()) {
        if let Ok((_, lines)) = lines_for_event(event_type, "src", &payload) {
            let (_, totals) = JournalService::validate_lines(&lines, chart_lookup)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(totals.is_balanced);
        }
    }

    /// Property 4: Void produces a mirror.
    ///
    /// *For any* posted entry, the reversal SHALL mirror each line and
    /// applying both to the chart SHALL leave every balance unchanged.
    #[test]
    fn prop_reversal_mirrors_and_cancels(lines in balanced_lines()) {
        let (resolved, totals) = JournalService::validate_lines(&lines, chart_lookup)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let original = JournalService::build_entry(header(), resolved, totals, 1, Utc::now());

        let plan = ReversalService::plan(&original, "undo", original.entry_date, None);
        let (rev_lines, rev_totals) =
            JournalService::validate_reversal_lines(&plan.lines, chart_lookup)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let reversal =
            JournalService::build_entry(plan.header, rev_lines, rev_totals, 2, Utc::now());
        prop_assert!(ReversalService::is_mirror(&original, &reversal));

        let now = Utc::now();
        let period = PeriodCode::from_date(original.entry_date);
        let mut accounts: Vec<LedgerAccount> = DEFAULT_CHART
            .iter()
            .map(|t| LedgerAccount::from_template(original.tenant_id, t, now))
            .collect();
        for entry in [&original, &reversal] {
            for line in &entry.lines {
                if let Some(account) = accounts.iter_mut().find(|a| a.code == line.account_code) {
                    account.apply_line(line.side(), line.amount(), period, now);
                }
            }
        }
        prop_assert!(accounts.iter().all(|a| a.current_balance == Decimal::ZERO));
        prop_assert!(TrialBalance::from_accounts(&accounts).is_balanced);
    }
}

//! Chart of accounts and ledger account balances.
//!
//! - Asset/Expense: debit-normal, balance += debit - credit
//! - Liability/Equity/Revenue: credit-normal, balance += credit - debit

use chrono::{DateTime, Utc};
use coffer_shared::types::{LedgerAccountId, TenantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::JournalError;
use super::types::LineSide;
use crate::period::PeriodCode;

/// Account category, which fixes the normal balance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountCategory {
    /// Debit-normal.
    Asset,
    /// Credit-normal.
    Liability,
    /// Credit-normal.
    Equity,
    /// Credit-normal.
    Revenue,
    /// Debit-normal.
    Expense,
}

impl AccountCategory {
    /// Normal balance side.
    #[must_use]
    pub const fn normal_side(self) -> LineSide {
        match self {
            Self::Asset | Self::Expense => LineSide::Debit,
            Self::Liability | Self::Equity | Self::Revenue => LineSide::Credit,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::str::FromStr for AccountCategory {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(JournalError::InvalidEnumValue {
                field: "category",
                value: s.to_string(),
            }),
        }
    }
}

/// Account codes of the default chart.
pub mod codes {
    /// Cash on hand.
    pub const CASH: &str = "1110";
    /// Bank account.
    pub const BANK: &str = "1120";
    /// Payment clearing (cards, wallets, online orders).
    pub const CLEARING: &str = "1130";
    /// Inventory at cost.
    pub const INVENTORY: &str = "1140";
    /// Sales tax payable.
    pub const TAX_PAYABLE: &str = "2110";
    /// Amounts owed to vendors.
    pub const VENDOR_PAYABLE: &str = "2130";
    /// Owner's equity.
    pub const EQUITY: &str = "3110";
    /// Sales revenue.
    pub const SALES: &str = "4110";
    /// Platform fee revenue.
    pub const PLATFORM_FEE_REVENUE: &str = "4120";
    /// Other income (inventory gains).
    pub const OTHER_INCOME: &str = "4190";
    /// Cost of goods sold.
    pub const COGS: &str = "5110";
    /// Inventory shrinkage.
    pub const SHRINKAGE: &str = "5120";
}

/// Seed definition of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTemplate {
    /// Account code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Category.
    pub category: AccountCategory,
}

const fn account(
    code: &'static str,
    name: &'static str,
    category: AccountCategory,
) -> AccountTemplate {
    AccountTemplate { code, name, category }
}

/// Accounts seeded for every tenant; event templates post only to these.
pub const DEFAULT_CHART: &[AccountTemplate] = &[
    account(codes::CASH, "Cash on Hand", AccountCategory::Asset),
    account(codes::BANK, "Bank", AccountCategory::Asset),
    account(codes::CLEARING, "Payment Clearing", AccountCategory::Asset),
    account(codes::INVENTORY, "Inventory", AccountCategory::Asset),
    account(codes::TAX_PAYABLE, "Sales Tax Payable", AccountCategory::Liability),
    account(codes::VENDOR_PAYABLE, "Vendor Payable", AccountCategory::Liability),
    account(codes::EQUITY, "Owner's Equity", AccountCategory::Equity),
    account(codes::SALES, "Sales Revenue", AccountCategory::Revenue),
    account(codes::PLATFORM_FEE_REVENUE, "Platform Fee Revenue", AccountCategory::Revenue),
    account(codes::OTHER_INCOME, "Other Income", AccountCategory::Revenue),
    account(codes::COGS, "Cost of Goods Sold", AccountCategory::Expense),
    account(codes::SHRINKAGE, "Inventory Shrinkage", AccountCategory::Expense),
];

/// What validation needs to know about an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// Account code.
    pub code: String,
    /// Whether postings are accepted.
    pub is_active: bool,
    /// Normal balance side.
    pub normal_side: LineSide,
}

/// A chart of accounts entry with running balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    /// Unique identifier.
    pub id: LedgerAccountId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Account code, unique per tenant.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Category.
    pub category: AccountCategory,
    /// Normal balance side, derived from category.
    pub normal_side: LineSide,
    /// Balance on the normal side.
    pub current_balance: Decimal,
    /// Debits posted in `period_code`.
    pub period_debit: Decimal,
    /// Credits posted in `period_code`.
    pub period_credit: Decimal,
    /// Period the accumulators belong to.
    pub period_code: Option<PeriodCode>,
    /// Whether postings are accepted.
    pub is_active: bool,
    /// Incremented on every posting.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last posting time.
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    /// Creates an account from a seed template.
    #[must_use]
    pub fn from_template(
        tenant_id: TenantId,
        template: &AccountTemplate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerAccountId::new(),
            tenant_id,
            code: template.code.to_string(),
            name: template.name.to_string(),
            category: template.category,
            normal_side: template.category.normal_side(),
            current_balance: Decimal::ZERO,
            period_debit: Decimal::ZERO,
            period_credit: Decimal::ZERO,
            period_code: None,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validation view of this account.
    #[must_use]
    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            code: self.code.clone(),
            is_active: self.is_active,
            normal_side: self.normal_side,
        }
    }

    /// Applies one posted line.
    ///
    /// The balance always moves. The period accumulators reset when
    /// `period` is newer than the one they hold and are left alone for
    /// postings into an older period.
    pub fn apply_line(
        &mut self,
        side: LineSide,
        amount: Decimal,
        period: PeriodCode,
        now: DateTime<Utc>,
    ) {
        self.current_balance += balance_change(self.normal_side, side, amount);

        match self.period_code {
            Some(current) if current > period => {}
            Some(current) if current == period => self.accumulate(side, amount),
            _ => {
                self.period_code = Some(period);
                self.period_debit = Decimal::ZERO;
                self.period_credit = Decimal::ZERO;
                self.accumulate(side, amount);
            }
        }

        self.version += 1;
        self.updated_at = now;
    }

    fn accumulate(&mut self, side: LineSide, amount: Decimal) {
        match side {
            LineSide::Debit => self.period_debit += amount,
            LineSide::Credit => self.period_credit += amount,
        }
    }
}

/// Signed change to a balance kept on `normal_side`.
#[must_use]
pub fn balance_change(normal_side: LineSide, side: LineSide, amount: Decimal) -> Decimal {
    if side == normal_side { amount } else { -amount }
}

/// One account row of a trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// Account code.
    pub account_code: String,
    /// Account name.
    pub account_name: String,
    /// Category.
    pub category: AccountCategory,
    /// Balance shown in the debit column.
    pub debit_balance: Decimal,
    /// Balance shown in the credit column.
    pub credit_balance: Decimal,
}

/// Trial balance of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    /// Rows ordered by account code.
    pub lines: Vec<TrialBalanceLine>,
    /// Σ debit column.
    pub total_debit: Decimal,
    /// Σ credit column.
    pub total_credit: Decimal,
    /// Whether the columns agree.
    pub is_balanced: bool,
}

impl TrialBalance {
    /// Builds a trial balance; a negative normal-side balance lands in the
    /// opposite column.
    #[must_use]
    pub fn from_accounts(accounts: &[LedgerAccount]) -> Self {
        let mut ordered: Vec<&LedgerAccount> = accounts.iter().collect();
        ordered.sort_by(|a, b| a.code.cmp(&b.code));

        let lines: Vec<TrialBalanceLine> = ordered
            .into_iter()
            .map(|account| {
                let amount = account.current_balance.abs();
                let side = if account.current_balance >= Decimal::ZERO {
                    account.normal_side
                } else {
                    account.normal_side.opposite()
                };
                let (debit_balance, credit_balance) = match side {
                    LineSide::Debit => (amount, Decimal::ZERO),
                    LineSide::Credit => (Decimal::ZERO, amount),
                };
                TrialBalanceLine {
                    account_code: account.code.clone(),
                    account_name: account.name.clone(),
                    category: account.category,
                    debit_balance,
                    credit_balance,
                }
            })
            .collect();

        let total_debit: Decimal = lines.iter().map(|l| l.debit_balance).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit_balance).sum();

        Self {
            lines,
            total_debit,
            total_credit,
            is_balanced: total_debit == total_credit,
        }
    }
}

//! Journal domain types.

use chrono::{DateTime, NaiveDate, Utc};
use coffer_shared::types::{JournalEntryId, TenantId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::JournalError;
use super::events::EventType;
use crate::period::PeriodCode;

/// Side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineSide {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

impl LineSide {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

impl std::fmt::Display for LineSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    /// Posted and effective.
    Posted,
    /// Voided by a reversal. Terminal.
    Voided,
}

impl JournalStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "POSTED",
            Self::Voided => "VOIDED",
        }
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JournalStatus {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POSTED" => Ok(Self::Posted),
            "VOIDED" => Ok(Self::Voided),
            _ => Err(JournalError::InvalidEnumValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// What produced a journal entry.
///
/// Serialized as `MANUAL`, `REVERSAL` or the event type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceType {
    /// Posted by hand.
    Manual,
    /// Posted from a business event template.
    Event(EventType),
    /// Reversal of a voided entry.
    Reversal,
}

impl SourceType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Event(event_type) => event_type.as_str(),
            Self::Reversal => "REVERSAL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(Self::Manual),
            "REVERSAL" => Ok(Self::Reversal),
            _ => s
                .parse::<EventType>()
                .map(Self::Event)
                .map_err(|_| JournalError::InvalidEnumValue {
                    field: "source_type",
                    value: s.to_string(),
                }),
        }
    }
}

impl TryFrom<String> for SourceType {
    type Error = JournalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.as_str().to_string()
    }
}

/// Journal operation, as named at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalAction {
    /// Manual posting.
    PostManual,
    /// Event template posting.
    PostEvent,
    /// Void via reversal.
    Void,
}

impl JournalAction {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PostManual => "POST_MANUAL",
            Self::PostEvent => "POST_EVENT",
            Self::Void => "VOID",
        }
    }
}

impl std::fmt::Display for JournalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JournalAction {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST_MANUAL" => Ok(Self::PostManual),
            "POST_EVENT" => Ok(Self::PostEvent),
            "VOID" => Ok(Self::Void),
            _ => Err(JournalError::InvalidEnumValue {
                field: "action",
                value: s.to_string(),
            }),
        }
    }
}

/// Requested journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLineInput {
    /// Chart of accounts code.
    pub account_code: String,
    /// Debit amount (zero if credit).
    #[serde(default)]
    pub debit_amount: Decimal,
    /// Credit amount (zero if debit).
    #[serde(default)]
    pub credit_amount: Decimal,
    /// Optional line description.
    #[serde(default)]
    pub description: Option<String>,
}

impl JournalLineInput {
    /// Debit line.
    #[must_use]
    pub fn debit(account_code: &str, amount: Decimal) -> Self {
        Self {
            account_code: account_code.to_string(),
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
            description: None,
        }
    }

    /// Credit line.
    #[must_use]
    pub fn credit(account_code: &str, amount: Decimal) -> Self {
        Self {
            account_code: account_code.to_string(),
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
            description: None,
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Posted journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// 1-based position within the entry.
    pub line_number: i32,
    /// Chart of accounts code.
    pub account_code: String,
    /// Debit amount (zero if credit).
    pub debit_amount: Decimal,
    /// Credit amount (zero if debit).
    pub credit_amount: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

impl JournalLine {
    /// Side of the non-zero amount.
    #[must_use]
    pub fn side(&self) -> LineSide {
        if self.debit_amount > Decimal::ZERO {
            LineSide::Debit
        } else {
            LineSide::Credit
        }
    }

    /// The non-zero amount.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        match self.side() {
            LineSide::Debit => self.debit_amount,
            LineSide::Credit => self.credit_amount,
        }
    }
}

/// Journal entry header and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Per-tenant sequence number, e.g. `JE-000042`.
    pub entry_number: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Period derived from `entry_date`.
    pub period_code: PeriodCode,
    /// Header description.
    pub description: String,
    /// Origin of the entry.
    pub source_type: SourceType,
    /// Business source id (events) or original entry id (reversals).
    pub source_id: Option<String>,
    /// External event id (events).
    pub event_id: Option<String>,
    /// Entry this one reverses.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// Reversal that voided this entry.
    pub reversed_by_entry_id: Option<JournalEntryId>,
    /// Current status.
    pub status: JournalStatus,
    /// Why it was voided.
    pub void_reason: Option<String>,
    /// When it was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Who voided it.
    pub voided_by: Option<UserId>,
    /// Σ debit amounts.
    pub total_debit: Decimal,
    /// Σ credit amounts.
    pub total_credit: Decimal,
    /// Lines (at least 2).
    pub lines: Vec<JournalLine>,
    /// Who posted it.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Formats a per-tenant sequence number.
    #[must_use]
    pub fn format_entry_number(sequence: u64) -> String {
        format!("JE-{sequence:06}")
    }

    /// Returns true if the entry is a reversal.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.source_type == SourceType::Reversal
    }
}

/// Input for a manual posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntryInput {
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Header description.
    pub description: String,
    /// Requested lines.
    pub lines: Vec<JournalLineInput>,
    /// Who posts it.
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// Input for an event posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPostingInput {
    /// Event type name, validated against the template table.
    pub event_type: String,
    /// External event id.
    pub event_id: String,
    /// Business source id; the idempotency key.
    pub source_id: String,
    /// Accounting date; defaults to today.
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    /// Raw event payload.
    pub payload: serde_json::Value,
    /// Who posts it.
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// Result of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingResult {
    /// The posted (or replayed) entry.
    pub entry: JournalEntry,
    /// True when replayed by source id.
    pub is_duplicate: bool,
}

/// Input for a void.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidInput {
    /// Why the entry is voided.
    pub reason: String,
    /// Who voids it.
    #[serde(default)]
    pub voided_by: Option<UserId>,
}

/// Result of a void.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidResult {
    /// The original entry, now VOIDED.
    pub original: JournalEntry,
    /// The new reversal entry.
    pub reversal: JournalEntry,
}

/// Entry totals for validation and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    /// Σ debit amounts.
    pub total_debit: Decimal,
    /// Σ credit amounts.
    pub total_credit: Decimal,
    /// Whether debits == credits.
    pub is_balanced: bool,
}

impl JournalTotals {
    /// Creates totals from debit and credit sums.
    #[must_use]
    pub fn new(total_debit: Decimal, total_credit: Decimal) -> Self {
        Self {
            total_debit,
            total_credit,
            is_balanced: total_debit == total_credit,
        }
    }

    /// Totals of a set of lines.
    #[must_use]
    pub fn of_lines(lines: &[JournalLine]) -> Self {
        Self::new(
            lines.iter().map(|l| l.debit_amount).sum(),
            lines.iter().map(|l| l.credit_amount).sum(),
        )
    }

    /// Returns the difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.total_debit - self.total_credit
    }
}

/// Filter for listing journal entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalEntryFilter {
    /// Only this status.
    #[serde(default)]
    pub status: Option<JournalStatus>,
    /// Only this source type.
    #[serde(default)]
    pub source_type: Option<SourceType>,
    /// Only this period.
    #[serde(default)]
    pub period_code: Option<PeriodCode>,
}

impl JournalEntryFilter {
    /// Returns true if the entry passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.is_none_or(|s| s == entry.status)
            && self.source_type.is_none_or(|s| s == entry.source_type)
            && self.period_code.is_none_or(|p| p == entry.period_code)
    }
}

//! Journal error types for validation, posting and voiding.

use coffer_shared::types::JournalEntryId;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::idempotency::IdempotencyError;
use crate::period::PeriodError;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 lines.
    #[error("Journal entry must have at least 2 lines")]
    MinLinesRequired,

    /// A line must have exactly one positive side.
    #[error("Line {line_number} is invalid: {reason}")]
    InvalidLine {
        /// 1-based line number.
        line_number: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Debits and credits differ.
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Void requires a reason.
    #[error("Void reason is required")]
    ReasonRequired,

    /// Event type is not in the template table.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Event payload is malformed or inconsistent.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// Event posting requires a source id.
    #[error("Source id is required")]
    SourceIdRequired,

    /// Event posting requires an event id.
    #[error("Event id is required")]
    EventIdRequired,

    /// A closed enum received an unknown value.
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnumValue {
        /// The field being parsed.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    // ========== Account Errors ==========
    /// Account code is not in the chart.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account is inactive and cannot be posted to.
    #[error("Account {0} is inactive")]
    AccountInactive(String),

    // ========== Entry State Errors ==========
    /// Journal entry does not exist for this tenant.
    #[error("Journal entry not found: {0}")]
    NotFound(JournalEntryId),

    /// No entry was posted for this source id.
    #[error("No journal entry for source {0}")]
    SourceNotFound(String),

    /// Entry was already voided.
    #[error("Journal entry {0} is already voided")]
    AlreadyVoided(JournalEntryId),

    /// Reversal entries cannot be voided.
    #[error("Journal entry {0} is a reversal and cannot be voided")]
    CannotVoidReversal(JournalEntryId),

    // ========== Period Errors ==========
    /// Period gate failed.
    #[error(transparent)]
    Period(#[from] PeriodError),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Storage Errors ==========
    /// Underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl JournalError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MinLinesRequired => "MIN_LINES_REQUIRED",
            Self::InvalidLine { .. } => "INVALID_LINE",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::UnknownEventType(_) => "UNKNOWN_EVENT_TYPE",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::SourceIdRequired => "SOURCE_ID_REQUIRED",
            Self::EventIdRequired => "EVENT_ID_REQUIRED",
            Self::InvalidEnumValue { .. } => "VALIDATION_ERROR",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::AlreadyVoided(_) => "ALREADY_VOIDED",
            Self::CannotVoidReversal(_) => "CANNOT_VOID_REVERSAL",
            Self::Period(e) => e.error_code(),
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::MinLinesRequired
            | Self::InvalidLine { .. }
            | Self::UnbalancedEntry { .. }
            | Self::ReasonRequired
            | Self::UnknownEventType(_)
            | Self::InvalidPayload(_)
            | Self::SourceIdRequired
            | Self::EventIdRequired
            | Self::InvalidEnumValue { .. } => 400,

            // 404 Not Found
            Self::NotFound(_) | Self::SourceNotFound(_) => 404,

            // 422 Unprocessable - references and state preconditions
            Self::AccountNotFound(_)
            | Self::AccountInactive(_)
            | Self::AlreadyVoided(_)
            | Self::CannotVoidReversal(_) => 422,

            Self::Period(e) => e.http_status_code(),

            // 409 Conflict
            Self::ConcurrentModification => 409,

            // 500 Internal Server Error
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}

impl From<IdempotencyError> for JournalError {
    fn from(err: IdempotencyError) -> Self {
        Self::Storage(err.to_string())
    }
}

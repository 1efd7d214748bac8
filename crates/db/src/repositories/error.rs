//! Repository error type.

use coffer_core::idempotency::IdempotencyError;
use coffer_core::journal::JournalError;
use coffer_core::period::PeriodError;
use coffer_core::wallet::WalletError;
use sea_orm::{DbErr, SqlErr};

/// Errors raised by the ledger repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Wallet rule violation.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Journal rule violation.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Period rule violation.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Stored idempotent result could not be used.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    /// A stored column holds a value the domain does not accept.
    #[error("Corrupt {column} value: {value}")]
    CorruptRow {
        /// Column name.
        column: &'static str,
        /// Offending value.
        value: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepositoryError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Wallet(e) => e.error_code(),
            Self::Journal(e) => e.error_code(),
            Self::Period(e) => e.error_code(),
            Self::Idempotency(e) => e.error_code(),
            Self::CorruptRow { .. } => "CORRUPT_ROW",
            Self::Database(e) if is_conflict(e) => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Wallet(e) => e.http_status_code(),
            Self::Journal(e) => e.http_status_code(),
            Self::Period(e) => e.http_status_code(),
            Self::Idempotency(e) => e.http_status_code(),
            Self::Database(e) if is_conflict(e) => 409,
            Self::CorruptRow { .. } | Self::Database(_) => 500,
        }
    }

    /// Returns true if the caller may retry the request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Wallet(e) => e.is_retryable(),
            Self::Journal(e) => e.is_retryable(),
            Self::Idempotency(e) => e.is_retryable(),
            Self::Database(e) => is_conflict(e),
            Self::Period(_) | Self::CorruptRow { .. } => false,
        }
    }
}

/// Lock, serialization and unique-key conflicts between concurrent writers.
///
/// A retry sees the winner's rows and replays or fails cleanly.
pub(crate) fn is_conflict(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    message.contains("40001")
        || message.contains("40P01")
        || message.contains("could not serialize")
        || message.contains("deadlock detected")
}

/// Parses a TEXT column into a domain value.
pub(crate) fn parse_column<T: std::str::FromStr>(
    column: &'static str,
    value: &str,
) -> Result<T, RepositoryError> {
    value.parse().map_err(|_| RepositoryError::CorruptRow {
        column,
        value: value.to_string(),
    })
}

//! Period error types.

use thiserror::Error;

use super::types::PeriodCode;

/// Errors raised by period management.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// Code is not a valid `YYYY-MM` month.
    #[error("Invalid period code: {0}")]
    InvalidPeriodCode(String),

    /// Period does not exist.
    #[error("Period not found: {0}")]
    PeriodNotFound(PeriodCode),

    /// Posting into a closed period.
    #[error("Period {0} is closed, no posting allowed")]
    PeriodClosed(PeriodCode),

    /// Closing an already closed period.
    #[error("Period {0} is already closed")]
    PeriodAlreadyClosed(PeriodCode),

    /// Reopening an open period.
    #[error("Period {0} is already open")]
    PeriodAlreadyOpen(PeriodCode),

    /// Underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PeriodError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriodCode(_) => "INVALID_PERIOD_CODE",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::PeriodClosed(_) => "PERIOD_CLOSED",
            Self::PeriodAlreadyClosed(_) => "PERIOD_ALREADY_CLOSED",
            Self::PeriodAlreadyOpen(_) => "PERIOD_ALREADY_OPEN",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidPeriodCode(_) => 400,
            Self::PeriodNotFound(_) => 404,
            Self::PeriodClosed(_) | Self::PeriodAlreadyClosed(_) | Self::PeriodAlreadyOpen(_) => {
                422
            }
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let code: PeriodCode = "2025-01".parse().unwrap();
        assert_eq!(PeriodError::PeriodClosed(code).error_code(), "PERIOD_CLOSED");
        assert_eq!(PeriodError::PeriodClosed(code).http_status_code(), 422);
        assert_eq!(PeriodError::PeriodNotFound(code).http_status_code(), 404);
        assert_eq!(
            PeriodError::InvalidPeriodCode("2025-13".into()).http_status_code(),
            400
        );
        assert_eq!(
            PeriodError::PeriodAlreadyOpen(code).to_string(),
            "Period 2025-01 is already open"
        );
    }
}

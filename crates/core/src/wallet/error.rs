//! Wallet error types.
//!
//! Every variant maps to a stable machine-readable code. Validation and
//! precondition errors are always raised before any write.

use coffer_shared::types::WalletId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{EntryFamily, WalletEntryType, WalletStatus};
use crate::idempotency::IdempotencyError;

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    // ========== Validation Errors ==========
    /// Amount must be positive and within the supported scale.
    #[error("Amount must be a positive decimal with at most 4 decimal places, got {0}")]
    InvalidAmount(Decimal),

    /// Entry type does not belong to the operation's family.
    #[error("Entry type {entry_type} is not a {expected} entry type")]
    InvalidEntryType {
        /// The supplied entry type.
        entry_type: WalletEntryType,
        /// The family the operation accepts.
        expected: EntryFamily,
    },

    /// Mutating calls must carry an idempotency key.
    #[error("Idempotency key is required")]
    IdempotencyKeyRequired,

    /// Hold operations must carry a hold id.
    #[error("Hold id is required")]
    HoldIdRequired,

    /// Owner fields do not match the wallet type.
    #[error("Invalid wallet owner: {0}")]
    InvalidOwner(String),

    /// Currency is not a 3-letter ISO code.
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// Transfer source and destination are the same wallet.
    #[error("Cannot transfer to the same wallet")]
    SameWallet,

    /// A closed enum received an unknown value.
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnumValue {
        /// The field being parsed.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    // ========== Lookup Errors ==========
    /// Wallet does not exist for this tenant.
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// Hold id was never created on this wallet.
    #[error("Hold not found: {0}")]
    HoldNotFound(String),

    // ========== Precondition Errors ==========
    /// Wallet is frozen or closed.
    #[error("Wallet {wallet_id} is not active (status: {status})")]
    WalletNotActive {
        /// The wallet ID.
        wallet_id: WalletId,
        /// The wallet's current status.
        status: WalletStatus,
    },

    /// Debit exceeds the wallet balance.
    #[error("Insufficient balance. Balance: {balance}, requested: {requested}")]
    InsufficientBalance {
        /// Current balance.
        balance: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Hold exceeds the available balance.
    #[error("Insufficient available balance. Available: {available}, requested: {requested}")]
    InsufficientAvailableBalance {
        /// Current available balance.
        available: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Hold id was already used on this wallet.
    #[error("Hold already exists: {0}")]
    HoldAlreadyExists(String),

    /// Hold was already released or captured.
    #[error("Hold already terminated: {0}")]
    HoldAlreadyTerminated(String),

    /// Release or capture exceeds the held amount.
    #[error("Amount {requested} exceeds held amount {held}")]
    HoldAmountExceeded {
        /// Amount held.
        held: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Wallets of different currencies cannot exchange funds.
    #[error("Currency mismatch: {from} vs {to}")]
    CurrencyMismatch {
        /// Source wallet currency.
        from: String,
        /// Destination wallet currency.
        to: String,
    },

    /// Status change is not allowed.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: WalletStatus,
        /// Requested status.
        to: WalletStatus,
    },

    /// Wallet still holds funds and cannot be closed.
    #[error("Wallet is not empty. Balance: {balance}, pending: {pending}")]
    WalletNotEmpty {
        /// Current balance.
        balance: Decimal,
        /// Current pending balance.
        pending: Decimal,
    },

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Storage Errors ==========
    /// Underlying store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WalletError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidEntryType { .. } => "INVALID_ENTRY_TYPE",
            Self::IdempotencyKeyRequired => "IDEMPOTENCY_KEY_REQUIRED",
            Self::HoldIdRequired => "HOLD_ID_REQUIRED",
            Self::InvalidOwner(_) => "INVALID_OWNER",
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
            Self::SameWallet => "SAME_WALLET",
            Self::InvalidEnumValue { .. } => "VALIDATION_ERROR",
            Self::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Self::HoldNotFound(_) => "HOLD_NOT_FOUND",
            Self::WalletNotActive { .. } => "WALLET_NOT_ACTIVE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientAvailableBalance { .. } => "INSUFFICIENT_AVAILABLE_BALANCE",
            Self::HoldAlreadyExists(_) => "HOLD_ALREADY_EXISTS",
            Self::HoldAlreadyTerminated(_) => "HOLD_ALREADY_TERMINATED",
            Self::HoldAmountExceeded { .. } => "HOLD_AMOUNT_EXCEEDED",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::WalletNotEmpty { .. } => "WALLET_NOT_EMPTY",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount(_)
            | Self::InvalidEntryType { .. }
            | Self::IdempotencyKeyRequired
            | Self::HoldIdRequired
            | Self::InvalidOwner(_)
            | Self::InvalidCurrency(_)
            | Self::SameWallet
            | Self::InvalidEnumValue { .. } => 400,

            // 404 Not Found
            Self::WalletNotFound(_) | Self::HoldNotFound(_) => 404,

            // 422 Unprocessable - business preconditions
            Self::WalletNotActive { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientAvailableBalance { .. }
            | Self::HoldAlreadyExists(_)
            | Self::HoldAlreadyTerminated(_)
            | Self::HoldAmountExceeded { .. }
            | Self::CurrencyMismatch { .. }
            | Self::InvalidStatusTransition { .. }
            | Self::WalletNotEmpty { .. } => 422,

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

impl From<IdempotencyError> for WalletError {
    fn from(err: IdempotencyError) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(WalletError::InvalidAmount(dec!(0)).error_code(), "INVALID_AMOUNT");
        assert_eq!(
            WalletError::InvalidEntryType {
                entry_type: WalletEntryType::DebitPayout,
                expected: EntryFamily::Credit,
            }
            .error_code(),
            "INVALID_ENTRY_TYPE"
        );
        assert_eq!(
            WalletError::InsufficientAvailableBalance {
                available: dec!(10),
                requested: dec!(20),
            }
            .error_code(),
            "INSUFFICIENT_AVAILABLE_BALANCE"
        );
        assert_eq!(WalletError::SameWallet.error_code(), "SAME_WALLET");
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(WalletError::IdempotencyKeyRequired.http_status_code(), 400);
        assert_eq!(WalletError::WalletNotFound(WalletId::new()).http_status_code(), 404);
        assert_eq!(
            WalletError::InsufficientBalance {
                balance: dec!(1),
                requested: dec!(2),
            }
            .http_status_code(),
            422
        );
        assert_eq!(WalletError::ConcurrentModification.http_status_code(), 409);
        assert_eq!(WalletError::Storage("down".into()).http_status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(WalletError::ConcurrentModification.is_retryable());
        assert!(!WalletError::SameWallet.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = WalletError::InsufficientBalance {
            balance: dec!(50.00),
            requested: dec!(75.00),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance. Balance: 50.00, requested: 75.00"
        );

        let err = WalletError::InvalidStatusTransition {
            from: WalletStatus::Closed,
            to: WalletStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from CLOSED to ACTIVE"
        );
    }
}

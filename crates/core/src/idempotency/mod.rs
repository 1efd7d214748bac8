//! Idempotency store contract.
//!
//! Mutating requests are deduplicated by `(tenant, scope, key)`. The first
//! call stores its result; replays receive that result verbatim. Records are
//! permanent. The store is injected, so the in-memory engine and the
//! PostgreSQL repositories share the same contract.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coffer_shared::types::{TenantId, WalletId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryIdempotencyStore;

/// Namespace of an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyScope {
    /// Wallet credits.
    WalletCredit,
    /// Wallet debits.
    WalletDebit,
    /// Hold, release and capture.
    WalletHoldAction,
    /// Wallet-to-wallet transfers.
    Transfer,
    /// Journal event posting, keyed by source id.
    EventPosting,
}

impl IdempotencyScope {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WalletCredit => "WALLET_CREDIT",
            Self::WalletDebit => "WALLET_DEBIT",
            Self::WalletHoldAction => "WALLET_HOLD_ACTION",
            Self::Transfer => "TRANSFER",
            Self::EventPosting => "EVENT_POSTING",
        }
    }
}

impl std::fmt::Display for IdempotencyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdempotencyScope {
    type Err = IdempotencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WALLET_CREDIT" => Ok(Self::WalletCredit),
            "WALLET_DEBIT" => Ok(Self::WalletDebit),
            "WALLET_HOLD_ACTION" => Ok(Self::WalletHoldAction),
            "TRANSFER" => Ok(Self::Transfer),
            "EVENT_POSTING" => Ok(Self::EventPosting),
            other => Err(IdempotencyError::Storage(format!(
                "unknown idempotency scope: {other}"
            ))),
        }
    }
}

/// Fully qualified idempotency key.
///
/// Wallet scopes carry the wallet id so the same caller key can be reused
/// on different wallets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Namespace.
    pub scope: IdempotencyScope,
    /// Wallet qualifier for wallet scopes.
    pub wallet_id: Option<WalletId>,
    /// Caller-supplied key.
    pub key: String,
}

impl IdempotencyKey {
    /// Key scoped to one wallet.
    #[must_use]
    pub fn for_wallet(
        tenant_id: TenantId,
        scope: IdempotencyScope,
        wallet_id: WalletId,
        key: &str,
    ) -> Self {
        Self {
            tenant_id,
            scope,
            wallet_id: Some(wallet_id),
            key: key.trim().to_string(),
        }
    }

    /// Key scoped to the whole tenant.
    #[must_use]
    pub fn for_tenant(tenant_id: TenantId, scope: IdempotencyScope, key: &str) -> Self {
        Self {
            tenant_id,
            scope,
            wallet_id: None,
            key: key.trim().to_string(),
        }
    }

    /// Storage form of the qualified key, without the tenant.
    ///
    /// `WALLET_CREDIT:{wallet_id}:{key}` or `EVENT_POSTING:{key}`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self.wallet_id {
            Some(wallet_id) => format!("{}:{}:{}", self.scope, wallet_id, self.key),
            None => format!("{}:{}", self.scope, self.key),
        }
    }
}

/// Stored result of a completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// The key this result answers.
    pub key: IdempotencyKey,
    /// Serialized response.
    pub response: serde_json::Value,
    /// When the first call completed.
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Serializes `response` into a new record.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the response cannot be encoded.
    pub fn new<T: Serialize>(key: IdempotencyKey, response: &T) -> Result<Self, IdempotencyError> {
        let response = serde_json::to_value(response)
            .map_err(|e| IdempotencyError::Serialization(e.to_string()))?;
        Ok(Self {
            key,
            response,
            created_at: Utc::now(),
        })
    }

    /// Decodes the stored response.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the stored value has a different shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, IdempotencyError> {
        serde_json::from_value(self.response.clone())
            .map_err(|e| IdempotencyError::Serialization(e.to_string()))
    }
}

/// Errors raised by idempotency stores.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// Stored response could not be encoded or decoded.
    #[error("Idempotency record serialization failed: {0}")]
    Serialization(String),

    /// Backing store failed.
    #[error("Idempotency store error: {0}")]
    Storage(String),
}

impl IdempotencyError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "IDEMPOTENCY_RECORD_INVALID",
            Self::Storage(_) => "IDEMPOTENCY_STORE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        500
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Durable store of idempotent results.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the stored record for `key`, if any.
    async fn get(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError>;

    /// Stores `record` unless one already exists for its key.
    ///
    /// Returns the existing record when the key was already claimed, or
    /// `None` when `record` was inserted.
    async fn put_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError>;
}

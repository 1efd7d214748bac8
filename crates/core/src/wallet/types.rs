//! Wallet domain types.

use chrono::{DateTime, Utc};
use coffer_shared::types::{CurrencyCode, LedgerEntryId, TenantId, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::WalletError;
use crate::idempotency::IdempotencyScope;

/// Kind of wallet, which determines the owner reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletType {
    /// Owned by a customer.
    Customer,
    /// Owned by a vendor.
    Vendor,
    /// Tenant-level platform wallet with no owner.
    Platform,
}

impl WalletType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Vendor => "VENDOR",
            Self::Platform => "PLATFORM",
        }
    }
}

impl std::fmt::Display for WalletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WalletType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Self::Customer),
            "VENDOR" => Ok(Self::Vendor),
            "PLATFORM" => Ok(Self::Platform),
            _ => Err(WalletError::InvalidEnumValue {
                field: "wallet_type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    /// Accepts all operations.
    Active,
    /// Temporarily blocked; can return to active.
    Frozen,
    /// Terminal.
    Closed,
}

impl WalletStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::Closed => "CLOSED",
        }
    }

    /// Returns true if the wallet can move from `self` to `target`.
    ///
    /// ACTIVE and FROZEN toggle; any non-closed status may close.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Frozen)
                | (Self::Frozen, Self::Active)
                | (Self::Active | Self::Frozen, Self::Closed)
        )
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WalletStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "FROZEN" => Ok(Self::Frozen),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(WalletError::InvalidEnumValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// Family an entry type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryFamily {
    /// `CREDIT_*` entries.
    Credit,
    /// `DEBIT_*` entries.
    Debit,
    /// `HOLD_*` entries.
    Hold,
}

impl std::fmt::Display for EntryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
            Self::Hold => "HOLD",
        })
    }
}

/// Type of a wallet ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletEntryType {
    /// Proceeds of a sale.
    CreditSaleProceeds,
    /// Platform fee income.
    CreditPlatformFee,
    /// Refund to the wallet owner.
    CreditRefund,
    /// Manual or transfer-in adjustment.
    CreditAdjustment,
    /// Payout out of the wallet.
    DebitPayout,
    /// Platform fee charged to the wallet.
    DebitPlatformFee,
    /// Funds reserved under a hold.
    HoldCreated,
    /// Hold returned to available funds.
    HoldReleased,
    /// Hold settled out of the balance.
    HoldCaptured,
}

impl WalletEntryType {
    /// All entry types, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::CreditSaleProceeds,
        Self::CreditPlatformFee,
        Self::CreditRefund,
        Self::CreditAdjustment,
        Self::DebitPayout,
        Self::DebitPlatformFee,
        Self::HoldCreated,
        Self::HoldReleased,
        Self::HoldCaptured,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditSaleProceeds => "CREDIT_SALE_PROCEEDS",
            Self::CreditPlatformFee => "CREDIT_PLATFORM_FEE",
            Self::CreditRefund => "CREDIT_REFUND",
            Self::CreditAdjustment => "CREDIT_ADJUSTMENT",
            Self::DebitPayout => "DEBIT_PAYOUT",
            Self::DebitPlatformFee => "DEBIT_PLATFORM_FEE",
            Self::HoldCreated => "HOLD_CREATED",
            Self::HoldReleased => "HOLD_RELEASED",
            Self::HoldCaptured => "HOLD_CAPTURED",
        }
    }

    /// Returns the family of this entry type.
    #[must_use]
    pub const fn family(&self) -> EntryFamily {
        match self {
            Self::CreditSaleProceeds
            | Self::CreditPlatformFee
            | Self::CreditRefund
            | Self::CreditAdjustment => EntryFamily::Credit,
            Self::DebitPayout | Self::DebitPlatformFee => EntryFamily::Debit,
            Self::HoldCreated | Self::HoldReleased | Self::HoldCaptured => EntryFamily::Hold,
        }
    }

    /// Returns true if entries of this type change `balance`.
    #[must_use]
    pub const fn affects_balance(&self) -> bool {
        !matches!(self, Self::HoldCreated | Self::HoldReleased)
    }
}

impl std::fmt::Display for WalletEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WalletEntryType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| WalletError::InvalidEnumValue {
                field: "entry_type",
                value: s.to_string(),
            })
    }
}

/// Mutating wallet operation, as named at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletAction {
    /// Credit funds.
    Credit,
    /// Debit funds.
    Debit,
    /// Reserve funds.
    Hold,
    /// Release a hold.
    Release,
    /// Capture a hold.
    Capture,
    /// Move funds between wallets.
    Transfer,
}

impl WalletAction {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
            Self::Hold => "HOLD",
            Self::Release => "RELEASE",
            Self::Capture => "CAPTURE",
            Self::Transfer => "TRANSFER",
        }
    }

    /// Idempotency namespace for this action.
    #[must_use]
    pub const fn idempotency_scope(&self) -> IdempotencyScope {
        match self {
            Self::Credit => IdempotencyScope::WalletCredit,
            Self::Debit => IdempotencyScope::WalletDebit,
            Self::Hold | Self::Release | Self::Capture => IdempotencyScope::WalletHoldAction,
            Self::Transfer => IdempotencyScope::Transfer,
        }
    }

    /// Entry type recorded by hold actions.
    #[must_use]
    pub const fn hold_entry_type(&self) -> Option<WalletEntryType> {
        match self {
            Self::Hold => Some(WalletEntryType::HoldCreated),
            Self::Release => Some(WalletEntryType::HoldReleased),
            Self::Capture => Some(WalletEntryType::HoldCaptured),
            _ => None,
        }
    }
}

impl std::fmt::Display for WalletAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WalletAction {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            "HOLD" => Ok(Self::Hold),
            "RELEASE" => Ok(Self::Release),
            "CAPTURE" => Ok(Self::Capture),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(WalletError::InvalidEnumValue {
                field: "action",
                value: s.to_string(),
            }),
        }
    }
}

/// Validated owner reference of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletOwner {
    /// Customer wallet owner.
    Customer(String),
    /// Vendor wallet owner.
    Vendor(String),
    /// Platform wallet (no owner).
    Platform,
}

impl WalletOwner {
    /// Builds an owner from raw request fields.
    ///
    /// CUSTOMER needs `customer_id` only, VENDOR needs `vendor_id` only and
    /// PLATFORM needs neither.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidOwner` when the fields do not fit the type.
    pub fn from_parts(
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
    ) -> Result<Self, WalletError> {
        let customer_id = customer_id.map(str::trim).filter(|s| !s.is_empty());
        let vendor_id = vendor_id.map(str::trim).filter(|s| !s.is_empty());

        match (wallet_type, customer_id, vendor_id) {
            (WalletType::Customer, Some(id), None) => Ok(Self::Customer(id.to_string())),
            (WalletType::Vendor, None, Some(id)) => Ok(Self::Vendor(id.to_string())),
            (WalletType::Platform, None, None) => Ok(Self::Platform),
            (WalletType::Customer, ..) => Err(WalletError::InvalidOwner(
                "CUSTOMER wallets require customer_id and no vendor_id".to_string(),
            )),
            (WalletType::Vendor, ..) => Err(WalletError::InvalidOwner(
                "VENDOR wallets require vendor_id and no customer_id".to_string(),
            )),
            (WalletType::Platform, ..) => Err(WalletError::InvalidOwner(
                "PLATFORM wallets take no owner".to_string(),
            )),
        }
    }

    /// Wallet type implied by this owner.
    #[must_use]
    pub const fn wallet_type(&self) -> WalletType {
        match self {
            Self::Customer(_) => WalletType::Customer,
            Self::Vendor(_) => WalletType::Vendor,
            Self::Platform => WalletType::Platform,
        }
    }

    /// Customer id, if any.
    #[must_use]
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Customer(id) => Some(id),
            _ => None,
        }
    }

    /// Vendor id, if any.
    #[must_use]
    pub fn vendor_id(&self) -> Option<&str> {
        match self {
            Self::Vendor(id) => Some(id),
            _ => None,
        }
    }
}

/// Identity tuple that makes a wallet unique within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletIdentity {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owner reference (carries the wallet type).
    pub owner: WalletOwner,
    /// Wallet currency.
    pub currency: CurrencyCode,
}

/// A tenant-scoped wallet with cached balances.
///
/// `balance` and `pending_balance` are a materialized view over the wallet's
/// ledger entries and can always be re-derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique identifier.
    pub id: WalletId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Wallet kind.
    pub wallet_type: WalletType,
    /// Customer owner (CUSTOMER wallets).
    pub customer_id: Option<String>,
    /// Vendor owner (VENDOR wallets).
    pub vendor_id: Option<String>,
    /// Wallet currency.
    pub currency: CurrencyCode,
    /// Current status.
    pub status: WalletStatus,
    /// Settled balance.
    pub balance: Decimal,
    /// Sum of open holds.
    pub pending_balance: Decimal,
    /// Sequence of the latest ledger entry (0 when empty).
    pub last_sequence: i64,
    /// Incremented on every mutation.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates a new ACTIVE wallet with zero balances.
    #[must_use]
    pub fn open(identity: &WalletIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: WalletId::new(),
            tenant_id: identity.tenant_id,
            wallet_type: identity.owner.wallet_type(),
            customer_id: identity.owner.customer_id().map(ToString::to_string),
            vendor_id: identity.owner.vendor_id().map(ToString::to_string),
            currency: identity.currency.clone(),
            status: WalletStatus::Active,
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            last_sequence: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance minus open holds. Derived, never stored.
    #[must_use]
    pub fn available_balance(&self) -> Decimal {
        self.balance - self.pending_balance
    }

    /// Returns true if the wallet accepts balance movements.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }

    /// Reconstructs the identity tuple of this wallet.
    #[must_use]
    pub fn identity(&self) -> WalletIdentity {
        let owner = match (&self.customer_id, &self.vendor_id) {
            (Some(id), _) => WalletOwner::Customer(id.clone()),
            (_, Some(id)) => WalletOwner::Vendor(id.clone()),
            _ => WalletOwner::Platform,
        };
        WalletIdentity {
            tenant_id: self.tenant_id,
            owner,
            currency: self.currency.clone(),
        }
    }

    /// Point-in-time view returned to callers.
    #[must_use]
    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            wallet_id: self.id,
            wallet_type: self.wallet_type,
            currency: self.currency.clone(),
            status: self.status,
            balance: self.balance,
            pending_balance: self.pending_balance,
            available_balance: self.available_balance(),
            version: self.version,
        }
    }
}

/// Wallet state returned alongside every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// Wallet ID.
    pub wallet_id: WalletId,
    /// Wallet kind.
    pub wallet_type: WalletType,
    /// Wallet currency.
    pub currency: CurrencyCode,
    /// Status at snapshot time.
    pub status: WalletStatus,
    /// Settled balance.
    pub balance: Decimal,
    /// Sum of open holds.
    pub pending_balance: Decimal,
    /// `balance - pending_balance`.
    pub available_balance: Decimal,
    /// Wallet version at snapshot time.
    pub version: i64,
}

/// Immutable wallet ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier.
    pub id: LedgerEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Wallet this entry belongs to.
    pub wallet_id: WalletId,
    /// Per-wallet monotonic sequence starting at 1.
    pub sequence: i64,
    /// Entry type.
    pub entry_type: WalletEntryType,
    /// Signed effect on `balance`.
    pub amount: Decimal,
    /// Signed effect on `pending_balance`.
    pub pending_delta: Decimal,
    /// Hold id for `HOLD_*` entries.
    pub hold_id: Option<String>,
    /// Caller-supplied idempotency key.
    pub idempotency_key: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Reference type (e.g. "order").
    pub reference_type: Option<String>,
    /// Reference id within the reference type.
    pub reference_id: Option<String>,
    /// Balance after this entry.
    pub balance_after: Decimal,
    /// Pending balance after this entry.
    pub pending_after: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for credit and debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementInput {
    /// Positive amount.
    pub amount: Decimal,
    /// Entry type, which must match the operation family.
    pub entry_type: WalletEntryType,
    /// Idempotency key, unique per wallet.
    #[serde(default)]
    pub idempotency_key: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional reference type.
    #[serde(default)]
    pub reference_type: Option<String>,
    /// Optional reference id.
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Input for hold, release and capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldInput {
    /// Positive amount.
    pub amount: Decimal,
    /// Caller-supplied hold id.
    #[serde(default)]
    pub hold_id: String,
    /// Optional idempotency key; defaults per action.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl HoldInput {
    /// Effective idempotency key for `action`.
    ///
    /// Without an explicit key, holds use `hold:{hold_id}`, releases
    /// `release:{hold_id}` and captures `capture:{hold_id}`.
    #[must_use]
    pub fn effective_key(&self, action: WalletAction) -> String {
        match self.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!(
                "{}:{}",
                action.as_str().to_ascii_lowercase(),
                self.hold_id.trim()
            ),
        }
    }
}

/// Input for transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferInput {
    /// Source wallet.
    pub from_wallet_id: WalletId,
    /// Destination wallet.
    pub to_wallet_id: WalletId,
    /// Positive amount.
    pub amount: Decimal,
    /// Idempotency key for the whole transfer.
    #[serde(default)]
    pub idempotency_key: String,
    /// Debit entry type; defaults to `DEBIT_PAYOUT`.
    #[serde(default)]
    pub debit_entry_type: Option<WalletEntryType>,
    /// Credit entry type; defaults to `CREDIT_ADJUSTMENT`.
    #[serde(default)]
    pub credit_entry_type: Option<WalletEntryType>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional reference type.
    #[serde(default)]
    pub reference_type: Option<String>,
    /// Optional reference id.
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Result of a single-wallet mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOperationResult {
    /// The created (or replayed) entry.
    pub entry: LedgerEntry,
    /// Wallet state right after the entry.
    pub wallet: WalletSnapshot,
    /// True when replayed from the idempotency store.
    pub is_duplicate: bool,
}

/// Result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Debit entry on the source wallet.
    pub debit_entry: LedgerEntry,
    /// Credit entry on the destination wallet.
    pub credit_entry: LedgerEntry,
    /// Source wallet after the transfer.
    pub from_wallet: WalletSnapshot,
    /// Destination wallet after the transfer.
    pub to_wallet: WalletSnapshot,
    /// True when replayed from the idempotency store.
    pub is_duplicate: bool,
}

/// Filter for listing wallets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletFilter {
    /// Only this wallet type.
    #[serde(default)]
    pub wallet_type: Option<WalletType>,
    /// Only this status.
    #[serde(default)]
    pub status: Option<WalletStatus>,
    /// Only this currency.
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

impl WalletFilter {
    /// Returns true if the wallet passes the filter.
    #[must_use]
    pub fn matches(&self, wallet: &Wallet) -> bool {
        self.wallet_type.is_none_or(|t| t == wallet.wallet_type)
            && self.status.is_none_or(|s| s == wallet.status)
            && self.currency.as_ref().is_none_or(|c| *c == wallet.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(WalletStatus::Active, WalletStatus::Frozen, true)]
    #[case(WalletStatus::Frozen, WalletStatus::Active, true)]
    #[case(WalletStatus::Active, WalletStatus::Closed, true)]
    #[case(WalletStatus::Frozen, WalletStatus::Closed, true)]
    #[case(WalletStatus::Closed, WalletStatus::Active, false)]
    #[case(WalletStatus::Closed, WalletStatus::Frozen, false)]
    #[case(WalletStatus::Active, WalletStatus::Active, false)]
    fn test_status_transitions(
        #[case] from: WalletStatus,
        #[case] to: WalletStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_entry_type_families() {
        assert_eq!(WalletEntryType::CreditRefund.family(), EntryFamily::Credit);
        assert_eq!(WalletEntryType::DebitPlatformFee.family(), EntryFamily::Debit);
        assert_eq!(WalletEntryType::HoldCaptured.family(), EntryFamily::Hold);
        assert!(WalletEntryType::HoldCaptured.affects_balance());
        assert!(!WalletEntryType::HoldCreated.affects_balance());
    }

    #[test]
    fn test_entry_type_parsing() {
        for entry_type in WalletEntryType::ALL {
            assert_eq!(WalletEntryType::from_str(entry_type.as_str()).unwrap(), entry_type);
        }
        assert_eq!(
            WalletEntryType::from_str("credit_refund").unwrap(),
            WalletEntryType::CreditRefund
        );
        let err = WalletEntryType::from_str("CREDIT_BONUS").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_entry_type_serde() {
        let json = serde_json::to_string(&WalletEntryType::CreditSaleProceeds).unwrap();
        assert_eq!(json, "\"CREDIT_SALE_PROCEEDS\"");
    }

    #[test]
    fn test_action_scopes() {
        assert_eq!(
            WalletAction::Release.idempotency_scope(),
            IdempotencyScope::WalletHoldAction
        );
        assert_eq!(
            WalletAction::Transfer.idempotency_scope(),
            IdempotencyScope::Transfer
        );
        assert!(WalletAction::from_str("refund").is_err());
    }

    #[rstest]
    #[case(WalletType::Customer, Some("cust-1"), None, true)]
    #[case(WalletType::Customer, None, None, false)]
    #[case(WalletType::Customer, Some("cust-1"), Some("v-1"), false)]
    #[case(WalletType::Vendor, None, Some("v-1"), true)]
    #[case(WalletType::Vendor, Some("cust-1"), None, false)]
    #[case(WalletType::Platform, None, None, true)]
    #[case(WalletType::Platform, None, Some("v-1"), false)]
    #[case(WalletType::Customer, Some("  "), None, false)]
    fn test_owner_validation(
        #[case] wallet_type: WalletType,
        #[case] customer_id: Option<&str>,
        #[case] vendor_id: Option<&str>,
        #[case] valid: bool,
    ) {
        let result = WalletOwner::from_parts(wallet_type, customer_id, vendor_id);
        assert_eq!(result.is_ok(), valid);
        if let Err(err) = result {
            assert_eq!(err.error_code(), "INVALID_OWNER");
        }
    }

    #[test]
    fn test_hold_default_keys() {
        let input = HoldInput {
            amount: Decimal::ONE,
            hold_id: "h1".to_string(),
            idempotency_key: None,
            description: None,
        };
        assert_eq!(input.effective_key(WalletAction::Hold), "hold:h1");
        assert_eq!(input.effective_key(WalletAction::Capture), "capture:h1");

        let explicit = HoldInput {
            idempotency_key: Some("k-9".to_string()),
            ..input
        };
        assert_eq!(explicit.effective_key(WalletAction::Release), "k-9");
    }

    #[test]
    fn test_wallet_identity_round_trip() {
        let identity = WalletIdentity {
            tenant_id: TenantId::new(),
            owner: WalletOwner::Vendor("v-7".to_string()),
            currency: CurrencyCode::parse("USD").unwrap(),
        };
        let wallet = Wallet::open(&identity, Utc::now());
        assert_eq!(wallet.wallet_type, WalletType::Vendor);
        assert_eq!(wallet.identity(), identity);
        assert_eq!(wallet.available_balance(), Decimal::ZERO);
        assert!(wallet.is_active());
    }

    #[test]
    fn test_missing_keys_deserialize_blank() {
        let hold: HoldInput = serde_json::from_value(serde_json::json!({ "amount": "5" })).unwrap();
        assert!(hold.hold_id.is_empty());

        let movement: MovementInput = serde_json::from_value(serde_json::json!({
            "amount": "5",
            "entry_type": "CREDIT_REFUND"
        }))
        .unwrap();
        assert!(movement.idempotency_key.is_empty());
    }
}

//! Wallet service: validation and entry planning.
//!
//! Pure business logic with no storage dependencies. Each planner takes the
//! current wallet state, validates the request and returns the entry to
//! append together with the wallet as it will look afterwards. Nothing is
//! written here; callers commit the plan atomically under their own lock.

use chrono::{DateTime, Utc};
use coffer_shared::types::{CurrencyCode, LedgerEntryId, TenantId, is_valid_amount};
use rust_decimal::Decimal;

use super::balance::HoldBook;
use super::error::WalletError;
use super::types::{
    EntryFamily, HoldInput, LedgerEntry, MovementInput, TransferInput, Wallet, WalletAction,
    WalletEntryType, WalletIdentity, WalletOwner, WalletStatus, WalletType,
};

/// An entry ready to be appended and the wallet state it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEntry {
    /// Entry to append.
    pub entry: LedgerEntry,
    /// Wallet after applying the entry.
    pub wallet: Wallet,
}

/// Request-level data carried onto a planned entry.
struct EntryDetails<'a> {
    entry_type: WalletEntryType,
    amount: Decimal,
    pending_delta: Decimal,
    hold_id: Option<&'a str>,
    idempotency_key: &'a str,
    description: Option<&'a str>,
    reference_type: Option<&'a str>,
    reference_id: Option<&'a str>,
}

/// Wallet service for validation and entry planning.
pub struct WalletService;

impl WalletService {
    /// Validates wallet identity fields.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOwner` or `InvalidCurrency`.
    pub fn validate_identity(
        tenant_id: TenantId,
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
        currency: &str,
    ) -> Result<WalletIdentity, WalletError> {
        let owner = WalletOwner::from_parts(wallet_type, customer_id, vendor_id)?;
        let currency = CurrencyCode::parse(currency).map_err(WalletError::InvalidCurrency)?;
        Ok(WalletIdentity {
            tenant_id,
            owner,
            currency,
        })
    }

    /// Rejects blank idempotency keys.
    ///
    /// # Errors
    ///
    /// Returns `IdempotencyKeyRequired`.
    pub fn require_key(key: &str) -> Result<&str, WalletError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(WalletError::IdempotencyKeyRequired);
        }
        Ok(key)
    }

    /// Validates a movement amount.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for zero, negative or over-scaled amounts.
    pub fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
        if !is_valid_amount(amount) {
            return Err(WalletError::InvalidAmount(amount));
        }
        Ok(())
    }

    /// Validates a credit or debit request without touching wallet state.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate_movement(
        input: &MovementInput,
        family: EntryFamily,
    ) -> Result<(), WalletError> {
        Self::require_key(&input.idempotency_key)?;
        Self::validate_amount(input.amount)?;
        if input.entry_type.family() != family {
            return Err(WalletError::InvalidEntryType {
                entry_type: input.entry_type,
                expected: family,
            });
        }
        Ok(())
    }

    /// Validates a hold, release or capture request without touching wallet state.
    ///
    /// # Errors
    ///
    /// Returns `HoldIdRequired` or `InvalidAmount`.
    pub fn validate_hold_request(input: &HoldInput) -> Result<(), WalletError> {
        if input.hold_id.trim().is_empty() {
            return Err(WalletError::HoldIdRequired);
        }
        Self::validate_amount(input.amount)
    }

    /// Validates a transfer request without touching wallet state.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate_transfer(
        input: &TransferInput,
    ) -> Result<(WalletEntryType, WalletEntryType), WalletError> {
        Self::require_key(&input.idempotency_key)?;
        Self::validate_amount(input.amount)?;
        if input.from_wallet_id == input.to_wallet_id {
            return Err(WalletError::SameWallet);
        }

        let debit_type = input.debit_entry_type.unwrap_or(WalletEntryType::DebitPayout);
        if debit_type.family() != EntryFamily::Debit {
            return Err(WalletError::InvalidEntryType {
                entry_type: debit_type,
                expected: EntryFamily::Debit,
            });
        }
        let credit_type = input
            .credit_entry_type
            .unwrap_or(WalletEntryType::CreditAdjustment);
        if credit_type.family() != EntryFamily::Credit {
            return Err(WalletError::InvalidEntryType {
                entry_type: credit_type,
                expected: EntryFamily::Credit,
            });
        }
        Ok((debit_type, credit_type))
    }

    /// Plans a credit.
    ///
    /// # Errors
    ///
    /// Returns validation errors or `WalletNotActive`.
    pub fn plan_credit(
        wallet: &Wallet,
        input: &MovementInput,
        now: DateTime<Utc>,
    ) -> Result<AppliedEntry, WalletError> {
        Self::validate_movement(input, EntryFamily::Credit)?;
        Self::ensure_active(wallet)?;

        Ok(Self::apply(
            wallet,
            &EntryDetails {
                entry_type: input.entry_type,
                amount: input.amount,
                pending_delta: Decimal::ZERO,
                hold_id: None,
                idempotency_key: input.idempotency_key.trim(),
                description: input.description.as_deref(),
                reference_type: input.reference_type.as_deref(),
                reference_id: input.reference_id.as_deref(),
            },
            now,
        ))
    }

    /// Plans a debit.
    ///
    /// Debits are gated by `balance`, not by available balance.
    ///
    /// # Errors
    ///
    /// Returns validation errors, `WalletNotActive` or `InsufficientBalance`.
    pub fn plan_debit(
        wallet: &Wallet,
        input: &MovementInput,
        now: DateTime<Utc>,
    ) -> Result<AppliedEntry, WalletError> {
        Self::validate_movement(input, EntryFamily::Debit)?;
        Self::ensure_active(wallet)?;
        Self::ensure_balance(wallet, input.amount)?;

        Ok(Self::apply(
            wallet,
            &EntryDetails {
                entry_type: input.entry_type,
                amount: -input.amount,
                pending_delta: Decimal::ZERO,
                hold_id: None,
                idempotency_key: input.idempotency_key.trim(),
                description: input.description.as_deref(),
                reference_type: input.reference_type.as_deref(),
                reference_id: input.reference_id.as_deref(),
            },
            now,
        ))
    }

    /// Plans a new hold.
    ///
    /// # Errors
    ///
    /// Returns validation errors, `WalletNotActive`, `HoldAlreadyExists` or
    /// `InsufficientAvailableBalance`.
    pub fn plan_hold(
        wallet: &Wallet,
        holds: &HoldBook,
        input: &HoldInput,
        now: DateTime<Utc>,
    ) -> Result<AppliedEntry, WalletError> {
        Self::validate_hold_request(input)?;
        Self::ensure_active(wallet)?;

        let hold_id = input.hold_id.trim();
        if holds.get(hold_id).is_some() {
            return Err(WalletError::HoldAlreadyExists(hold_id.to_string()));
        }

        let available = wallet.available_balance();
        if input.amount > available {
            return Err(WalletError::InsufficientAvailableBalance {
                available,
                requested: input.amount,
            });
        }

        let key = input.effective_key(WalletAction::Hold);
        Ok(Self::apply(
            wallet,
            &EntryDetails {
                entry_type: WalletEntryType::HoldCreated,
                amount: Decimal::ZERO,
                pending_delta: input.amount,
                hold_id: Some(hold_id),
                idempotency_key: &key,
                description: input.description.as_deref(),
                reference_type: None,
                reference_id: None,
            },
            now,
        ))
    }

    /// Plans a release or capture of an open hold.
    ///
    /// The hold is terminated even when `amount` is less than the held
    /// amount: the whole reservation leaves `pending_balance`, and only a
    /// capture moves `amount` out of `balance`.
    ///
    /// # Errors
    ///
    /// Returns validation errors, `WalletNotActive`, `HoldNotFound`,
    /// `HoldAlreadyTerminated`, `HoldAmountExceeded` or, for captures,
    /// `InsufficientBalance`.
    pub fn plan_hold_action(
        wallet: &Wallet,
        holds: &HoldBook,
        action: WalletAction,
        input: &HoldInput,
        now: DateTime<Utc>,
    ) -> Result<AppliedEntry, WalletError> {
        let entry_type = match action {
            WalletAction::Release => WalletEntryType::HoldReleased,
            WalletAction::Capture => WalletEntryType::HoldCaptured,
            other => {
                return Err(WalletError::InvalidEnumValue {
                    field: "action",
                    value: other.as_str().to_string(),
                });
            }
        };

        Self::validate_hold_request(input)?;
        Self::ensure_active(wallet)?;

        let hold_id = input.hold_id.trim();
        let hold = holds
            .get(hold_id)
            .ok_or_else(|| WalletError::HoldNotFound(hold_id.to_string()))?;
        if !hold.is_open() {
            return Err(WalletError::HoldAlreadyTerminated(hold_id.to_string()));
        }
        if input.amount > hold.held {
            return Err(WalletError::HoldAmountExceeded {
                held: hold.held,
                requested: input.amount,
            });
        }

        // Debits are not gated by holds, so the balance may have dropped below
        // the reservation since it was created.
        let amount = if entry_type == WalletEntryType::HoldCaptured {
            Self::ensure_balance(wallet, input.amount)?;
            -input.amount
        } else {
            Decimal::ZERO
        };

        let key = input.effective_key(action);
        Ok(Self::apply(
            wallet,
            &EntryDetails {
                entry_type,
                amount,
                pending_delta: -hold.held,
                hold_id: Some(hold_id),
                idempotency_key: &key,
                description: input.description.as_deref(),
                reference_type: None,
                reference_id: None,
            },
            now,
        ))
    }

    /// Plans both legs of a transfer.
    ///
    /// Both legs are validated before either is returned, so a rejected
    /// credit leg can never leave a half-applied debit.
    ///
    /// # Errors
    ///
    /// Returns validation errors, `WalletNotActive`, `CurrencyMismatch` or
    /// `InsufficientBalance`.
    pub fn plan_transfer(
        from: &Wallet,
        to: &Wallet,
        input: &TransferInput,
        now: DateTime<Utc>,
    ) -> Result<(AppliedEntry, AppliedEntry), WalletError> {
        let (debit_type, credit_type) = Self::validate_transfer(input)?;
        Self::ensure_active(from)?;
        Self::ensure_active(to)?;
        if from.currency != to.currency {
            return Err(WalletError::CurrencyMismatch {
                from: from.currency.to_string(),
                to: to.currency.to_string(),
            });
        }
        Self::ensure_balance(from, input.amount)?;

        let key = format!("transfer:{}", input.idempotency_key.trim());
        let debit = Self::apply(
            from,
            &EntryDetails {
                entry_type: debit_type,
                amount: -input.amount,
                pending_delta: Decimal::ZERO,
                hold_id: None,
                idempotency_key: &key,
                description: input.description.as_deref(),
                reference_type: input.reference_type.as_deref(),
                reference_id: input.reference_id.as_deref(),
            },
            now,
        );
        let credit = Self::apply(
            to,
            &EntryDetails {
                entry_type: credit_type,
                amount: input.amount,
                pending_delta: Decimal::ZERO,
                hold_id: None,
                idempotency_key: &key,
                description: input.description.as_deref(),
                reference_type: input.reference_type.as_deref(),
                reference_id: input.reference_id.as_deref(),
            },
            now,
        );
        Ok((debit, credit))
    }

    /// Validates an admin status change and returns the updated wallet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` or `WalletNotEmpty`.
    pub fn plan_status_change(
        wallet: &Wallet,
        target: WalletStatus,
        now: DateTime<Utc>,
    ) -> Result<Wallet, WalletError> {
        if !wallet.status.can_transition_to(target) {
            return Err(WalletError::InvalidStatusTransition {
                from: wallet.status,
                to: target,
            });
        }
        if target == WalletStatus::Closed
            && (wallet.balance != Decimal::ZERO || wallet.pending_balance != Decimal::ZERO)
        {
            return Err(WalletError::WalletNotEmpty {
                balance: wallet.balance,
                pending: wallet.pending_balance,
            });
        }

        let mut updated = wallet.clone();
        updated.status = target;
        updated.version += 1;
        updated.updated_at = now;
        Ok(updated)
    }

    fn ensure_active(wallet: &Wallet) -> Result<(), WalletError> {
        if !wallet.is_active() {
            return Err(WalletError::WalletNotActive {
                wallet_id: wallet.id,
                status: wallet.status,
            });
        }
        Ok(())
    }

    fn ensure_balance(wallet: &Wallet, amount: Decimal) -> Result<(), WalletError> {
        if amount > wallet.balance {
            return Err(WalletError::InsufficientBalance {
                balance: wallet.balance,
                requested: amount,
            });
        }
        Ok(())
    }

    fn apply(wallet: &Wallet, details: &EntryDetails<'_>, now: DateTime<Utc>) -> AppliedEntry {
        let sequence = wallet.last_sequence + 1;
        let balance_after = wallet.balance + details.amount;
        let pending_after = wallet.pending_balance + details.pending_delta;

        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            tenant_id: wallet.tenant_id,
            wallet_id: wallet.id,
            sequence,
            entry_type: details.entry_type,
            amount: details.amount,
            pending_delta: details.pending_delta,
            hold_id: details.hold_id.map(ToString::to_string),
            idempotency_key: details.idempotency_key.to_string(),
            description: details.description.map(ToString::to_string),
            reference_type: details.reference_type.map(ToString::to_string),
            reference_id: details.reference_id.map(ToString::to_string),
            balance_after,
            pending_after,
            created_at: now,
        };

        let mut updated = wallet.clone();
        updated.balance = balance_after;
        updated.pending_balance = pending_after;
        updated.last_sequence = sequence;
        updated.version += 1;
        updated.updated_at = now;

        AppliedEntry {
            entry,
            wallet: updated,
        }
    }
}

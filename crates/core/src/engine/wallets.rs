//! Wallet operations of the embedded engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coffer_shared::types::{PageRequest, PageResponse, TenantId, WalletId};
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{LedgerEngine, WalletSlot, WalletState};
use crate::idempotency::{IdempotencyKey, IdempotencyRecord};
use crate::wallet::{
    AppliedEntry, EntryFamily, HoldBook, HoldInput, LedgerEntry, MovementInput, Reconciliation,
    TransferInput, TransferResult, Wallet, WalletAction, WalletError, WalletFilter,
    WalletOperationResult, WalletService, WalletStatus, WalletType, reconcile,
};

impl WalletState {
    fn new(wallet: Wallet) -> Self {
        Self {
            wallet,
            entries: Vec::new(),
            holds: HoldBook::default(),
        }
    }

    fn commit(&mut self, applied: AppliedEntry) {
        self.holds.record(&applied.entry);
        self.entries.push(applied.entry);
        self.wallet = applied.wallet;
    }
}

fn replay_single(record: &IdempotencyRecord) -> Result<WalletOperationResult, WalletError> {
    let mut result: WalletOperationResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

fn replay_transfer(record: &IdempotencyRecord) -> Result<TransferResult, WalletError> {
    let mut result: TransferResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

impl LedgerEngine {
    /// Returns the wallet for the identity tuple, creating it if needed.
    ///
    /// The flag is true when the wallet was created by this call.
    pub async fn get_or_create_wallet(
        &self,
        tenant_id: TenantId,
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
        currency: &str,
    ) -> Result<(Wallet, bool), WalletError> {
        let identity = WalletService::validate_identity(
            tenant_id,
            wallet_type,
            customer_id,
            vendor_id,
            currency,
        )?;

        let wallet_id = match self.identities.entry(identity.clone()) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => {
                let wallet = Wallet::open(&identity, Utc::now());
                self.wallets.insert(
                    wallet.id,
                    Arc::new(WalletSlot {
                        tenant_id,
                        state: Mutex::new(WalletState::new(wallet.clone())),
                    }),
                );
                slot.insert(wallet.id);
                info!(
                    tenant_id = %tenant_id,
                    wallet_id = %wallet.id,
                    wallet_type = %wallet.wallet_type,
                    currency = %wallet.currency,
                    "Wallet created"
                );
                return Ok((wallet, true));
            }
        };

        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let wallet = slot.state.lock().await.wallet.clone();
        Ok((wallet, false))
    }

    /// Finds the wallet for an identity tuple without creating it.
    pub async fn find_wallet(
        &self,
        tenant_id: TenantId,
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
        currency: &str,
    ) -> Result<Option<Wallet>, WalletError> {
        let identity = WalletService::validate_identity(
            tenant_id,
            wallet_type,
            customer_id,
            vendor_id,
            currency,
        )?;
        let Some(wallet_id) = self.identities.get(&identity).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.get_wallet(tenant_id, wallet_id).await.map(Some)
    }

    /// Current state of a wallet.
    pub async fn get_wallet(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Wallet, WalletError> {
        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let wallet = slot.state.lock().await.wallet.clone();
        Ok(wallet)
    }

    /// Lists a tenant's wallets, oldest first.
    pub async fn list_wallets(
        &self,
        tenant_id: TenantId,
        filter: &WalletFilter,
        page: PageRequest,
    ) -> PageResponse<Wallet> {
        let slots: Vec<Arc<WalletSlot>> = self
            .wallets
            .iter()
            .filter(|slot| slot.tenant_id == tenant_id)
            .map(|slot| slot.value().clone())
            .collect();

        let mut wallets = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.lock().await;
            if filter.matches(&state.wallet) {
                wallets.push(state.wallet.clone());
            }
        }
        wallets.sort_by_key(|w| w.id);

        let total = wallets.len() as u64;
        PageResponse::new(page.slice(&wallets), page, total)
    }

    /// Lists a wallet's entries in sequence order.
    pub async fn list_wallet_entries(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerEntry>, WalletError> {
        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let state = slot.state.lock().await;
        let total = state.entries.len() as u64;
        Ok(PageResponse::new(page.slice(&state.entries), page, total))
    }

    /// Credits a wallet.
    pub async fn credit(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: MovementInput,
    ) -> Result<WalletOperationResult, WalletError> {
        WalletService::validate_movement(&input, EntryFamily::Credit)?;
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            WalletAction::Credit,
            &input.idempotency_key,
            |state, now| WalletService::plan_credit(&state.wallet, &input, now),
        )
        .await
    }

    /// Debits a wallet. Gated by balance, not by available balance.
    pub async fn debit(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: MovementInput,
    ) -> Result<WalletOperationResult, WalletError> {
        WalletService::validate_movement(&input, EntryFamily::Debit)?;
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            WalletAction::Debit,
            &input.idempotency_key,
            |state, now| WalletService::plan_debit(&state.wallet, &input, now),
        )
        .await
    }

    /// Places a hold on available funds.
    pub async fn hold(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, WalletError> {
        WalletService::validate_hold_request(&input)?;
        let key = input.effective_key(WalletAction::Hold);
        self.run_wallet_operation(tenant_id, wallet_id, WalletAction::Hold, &key, |state, now| {
            WalletService::plan_hold(&state.wallet, &state.holds, &input, now)
        })
        .await
    }

    /// Releases an open hold back to available funds.
    pub async fn release(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, WalletError> {
        self.hold_action(tenant_id, wallet_id, WalletAction::Release, input)
            .await
    }

    /// Captures an open hold out of the balance.
    pub async fn capture(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, WalletError> {
        self.hold_action(tenant_id, wallet_id, WalletAction::Capture, input)
            .await
    }

    async fn hold_action(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        action: WalletAction,
        input: HoldInput,
    ) -> Result<WalletOperationResult, WalletError> {
        WalletService::validate_hold_request(&input)?;
        let key = input.effective_key(action);
        self.run_wallet_operation(tenant_id, wallet_id, action, &key, |state, now| {
            WalletService::plan_hold_action(&state.wallet, &state.holds, action, &input, now)
        })
        .await
    }

    /// Moves funds between two wallets of the same tenant and currency.
    ///
    /// Both wallets are locked in ascending id order. Both entries are
    /// committed together or not at all.
    pub async fn transfer(
        &self,
        tenant_id: TenantId,
        input: TransferInput,
    ) -> Result<TransferResult, WalletError> {
        WalletService::validate_transfer(&input)?;
        let from_slot = self.wallet_slot(tenant_id, input.from_wallet_id)?;
        let to_slot = self.wallet_slot(tenant_id, input.to_wallet_id)?;

        let (mut from, mut to) = if input.from_wallet_id < input.to_wallet_id {
            let from = from_slot.state.lock().await;
            let to = to_slot.state.lock().await;
            (from, to)
        } else {
            let to = to_slot.state.lock().await;
            let from = from_slot.state.lock().await;
            (from, to)
        };

        let key = IdempotencyKey::for_wallet(
            tenant_id,
            WalletAction::Transfer.idempotency_scope(),
            input.from_wallet_id,
            &input.idempotency_key,
        );
        if let Some(record) = self.idempotency.get(&key).await? {
            debug!(tenant_id = %tenant_id, key = %key.key, "Replaying transfer");
            return replay_transfer(&record);
        }

        let (debit, credit) =
            WalletService::plan_transfer(&from.wallet, &to.wallet, &input, Utc::now())
                .inspect_err(|e| {
                    warn!(
                        tenant_id = %tenant_id,
                        from_wallet_id = %input.from_wallet_id,
                        to_wallet_id = %input.to_wallet_id,
                        error = %e,
                        "Transfer rejected"
                    );
                })?;

        let result = TransferResult {
            debit_entry: debit.entry.clone(),
            credit_entry: credit.entry.clone(),
            from_wallet: debit.wallet.snapshot(),
            to_wallet: credit.wallet.snapshot(),
            is_duplicate: false,
        };
        let record = IdempotencyRecord::new(key, &result)?;
        if let Some(existing) = self.idempotency.put_if_absent(record).await? {
            return replay_transfer(&existing);
        }

        from.commit(debit);
        to.commit(credit);
        info!(
            tenant_id = %tenant_id,
            from_wallet_id = %input.from_wallet_id,
            to_wallet_id = %input.to_wallet_id,
            amount = %input.amount,
            "Transfer completed"
        );
        Ok(result)
    }

    /// Admin status change.
    pub async fn set_wallet_status(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        status: WalletStatus,
    ) -> Result<Wallet, WalletError> {
        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let mut state = slot.state.lock().await;
        let updated = WalletService::plan_status_change(&state.wallet, status, Utc::now())?;
        info!(
            tenant_id = %tenant_id,
            wallet_id = %wallet_id,
            from = %state.wallet.status,
            to = %status,
            "Wallet status changed"
        );
        state.wallet = updated.clone();
        Ok(updated)
    }

    /// Recomputes balances from the entry log and repairs the cache.
    pub async fn recalculate_balance(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Reconciliation, WalletError> {
        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let mut state = slot.state.lock().await;
        let mut report = reconcile(&state.wallet, &state.entries);

        if !report.is_consistent() {
            warn!(
                tenant_id = %tenant_id,
                wallet_id = %wallet_id,
                balance_discrepancy = %report.balance_discrepancy,
                pending_discrepancy = %report.pending_discrepancy,
                "Wallet cache diverged from ledger entries, repairing"
            );
            state.holds = HoldBook::from_entries(&state.entries);
            state.wallet.balance = report.computed_balance;
            state.wallet.pending_balance = report.computed_pending_balance;
            state.wallet.version += 1;
            state.wallet.updated_at = Utc::now();
            report.repaired = true;
        }
        Ok(report)
    }

    fn wallet_slot(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Arc<WalletSlot>, WalletError> {
        self.wallets
            .get(&wallet_id)
            .filter(|slot| slot.tenant_id == tenant_id)
            .map(|slot| slot.value().clone())
            .ok_or(WalletError::WalletNotFound(wallet_id))
    }

    /// Runs one single-wallet mutation under the wallet lock.
    ///
    /// The idempotency lookup, the plan and the commit all happen while the
    /// lock is held.
    async fn run_wallet_operation<F>(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        action: WalletAction,
        idempotency_key: &str,
        plan: F,
    ) -> Result<WalletOperationResult, WalletError>
    where
        F: FnOnce(&WalletState, DateTime<Utc>) -> Result<AppliedEntry, WalletError>,
    {
        let slot = self.wallet_slot(tenant_id, wallet_id)?;
        let mut state = slot.state.lock().await;

        let key = IdempotencyKey::for_wallet(
            tenant_id,
            action.idempotency_scope(),
            wallet_id,
            idempotency_key,
        );
        if let Some(record) = self.idempotency.get(&key).await? {
            debug!(
                wallet_id = %wallet_id,
                action = %action,
                key = %key.key,
                "Replaying wallet operation"
            );
            return replay_single(&record);
        }

        let applied = plan(&state, Utc::now()).inspect_err(|e| {
            warn!(
                tenant_id = %tenant_id,
                wallet_id = %wallet_id,
                action = %action,
                error = %e,
                "Wallet operation rejected"
            );
        })?;

        let result = WalletOperationResult {
            entry: applied.entry.clone(),
            wallet: applied.wallet.snapshot(),
            is_duplicate: false,
        };
        let record = IdempotencyRecord::new(key, &result)?;
        if let Some(existing) = self.idempotency.put_if_absent(record).await? {
            return replay_single(&existing);
        }

        state.commit(applied);
        info!(
            tenant_id = %tenant_id,
            wallet_id = %wallet_id,
            action = %action,
            entry_type = %result.entry.entry_type,
            amount = %result.entry.amount,
            sequence = result.entry.sequence,
            "Wallet entry appended"
        );
        Ok(result)
    }
}

//! Wallet repository.
//!
//! Every mutation runs in one transaction that holds `SELECT ... FOR UPDATE`
//! on the wallet row. The idempotency lookup, the plan, the entry insert,
//! the cached balance update and the idempotency record all happen under
//! that lock, so a key is applied at most once and sequences stay gapless.

use chrono::{DateTime, Utc};
use coffer_core::idempotency::{IdempotencyKey, IdempotencyRecord};
use coffer_core::wallet::{
    AppliedEntry, EntryFamily, HoldBook, HoldInput, LedgerEntry, MovementInput, Reconciliation,
    TransferInput, TransferResult, Wallet, WalletAction, WalletError, WalletFilter,
    WalletIdentity, WalletOperationResult, WalletService, WalletStatus, WalletType, reconcile,
};
use coffer_shared::types::{PageRequest, PageResponse, TenantId, WalletId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr,
    TransactionTrait,
};
use tracing::{debug, info, warn};

use super::error::RepositoryError;
use super::idempotency::{find_record, insert_record};
use super::mapping::{entry_active_model, entry_from_model, wallet_active_model, wallet_from_model};
use crate::entities::{wallet_ledger_entries, wallets};

/// Wallet repository.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
}

fn scoped(tenant_id: TenantId, wallet_id: WalletId) -> Select<wallets::Entity> {
    wallets::Entity::find_by_id(wallet_id.into_inner())
        .filter(wallets::Column::TenantId.eq(tenant_id.into_inner()))
}

fn by_identity(identity: &WalletIdentity) -> Select<wallets::Entity> {
    let query = wallets::Entity::find()
        .filter(wallets::Column::TenantId.eq(identity.tenant_id.into_inner()))
        .filter(wallets::Column::WalletType.eq(identity.owner.wallet_type().as_str()))
        .filter(wallets::Column::Currency.eq(identity.currency.as_str()));
    let query = match identity.owner.customer_id() {
        Some(id) => query.filter(wallets::Column::CustomerId.eq(id)),
        None => query.filter(wallets::Column::CustomerId.is_null()),
    };
    match identity.owner.vendor_id() {
        Some(id) => query.filter(wallets::Column::VendorId.eq(id)),
        None => query.filter(wallets::Column::VendorId.is_null()),
    }
}

async fn lock_wallet(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    wallet_id: WalletId,
) -> Result<Wallet, RepositoryError> {
    let model = scoped(tenant_id, wallet_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(WalletError::WalletNotFound(wallet_id))?;
    wallet_from_model(model)
}

async fn load_hold<C: ConnectionTrait>(
    conn: &C,
    wallet_id: WalletId,
    hold_id: &str,
) -> Result<HoldBook, RepositoryError> {
    let entries = wallet_ledger_entries::Entity::find()
        .filter(wallet_ledger_entries::Column::WalletId.eq(wallet_id.into_inner()))
        .filter(wallet_ledger_entries::Column::HoldId.eq(hold_id))
        .order_by_asc(wallet_ledger_entries::Column::Sequence)
        .all(conn)
        .await?
        .into_iter()
        .map(entry_from_model)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HoldBook::from_entries(&entries))
}

/// Writes the new wallet state, guarded by the version read under the lock.
async fn store_wallet(
    txn: &DatabaseTransaction,
    previous_version: i64,
    wallet: &Wallet,
) -> Result<(), RepositoryError> {
    let updated = wallets::Entity::update_many()
        .set(wallet_active_model(wallet))
        .filter(wallets::Column::Id.eq(wallet.id.into_inner()))
        .filter(wallets::Column::Version.eq(previous_version))
        .exec(txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(WalletError::ConcurrentModification.into());
    }
    Ok(())
}

async fn append(
    txn: &DatabaseTransaction,
    previous_version: i64,
    applied: &AppliedEntry,
) -> Result<(), RepositoryError> {
    entry_active_model(&applied.entry).insert(txn).await?;
    store_wallet(txn, previous_version, &applied.wallet).await
}

fn replay_single(record: &IdempotencyRecord) -> Result<WalletOperationResult, RepositoryError> {
    let mut result: WalletOperationResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

fn replay_transfer(record: &IdempotencyRecord) -> Result<TransferResult, RepositoryError> {
    let mut result: TransferResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

impl WalletRepository {
    /// Creates a new wallet repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the wallet for the identity tuple, creating it if needed.
    ///
    /// The flag is true when the wallet was created by this call. Two racing
    /// creators converge on the same row through the identity unique index.
    ///
    /// # Errors
    ///
    /// Returns validation errors for the identity, or a database error.
    pub async fn get_or_create_wallet(
        &self,
        tenant_id: TenantId,
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
        currency: &str,
    ) -> Result<(Wallet, bool), RepositoryError> {
        let identity = WalletService::validate_identity(
            tenant_id,
            wallet_type,
            customer_id,
            vendor_id,
            currency,
        )?;

        if let Some(model) = by_identity(&identity).one(&self.db).await? {
            return Ok((wallet_from_model(model)?, false));
        }

        let wallet = Wallet::open(&identity, Utc::now());
        match wallet_active_model(&wallet).insert(&self.db).await {
            Ok(model) => {
                info!(
                    tenant_id = %tenant_id,
                    wallet_id = %wallet.id,
                    wallet_type = %wallet.wallet_type,
                    currency = %wallet.currency,
                    "Wallet created"
                );
                Ok((wallet_from_model(model)?, true))
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(tenant_id = %tenant_id, "Wallet created concurrently, reloading");
                let model = by_identity(&identity)
                    .one(&self.db)
                    .await?
                    .ok_or(WalletError::ConcurrentModification)?;
                Ok((wallet_from_model(model)?, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Finds the wallet for an identity tuple without creating it.
    ///
    /// # Errors
    ///
    /// Returns validation errors for the identity, or a database error.
    pub async fn find_wallet(
        &self,
        tenant_id: TenantId,
        wallet_type: WalletType,
        customer_id: Option<&str>,
        vendor_id: Option<&str>,
        currency: &str,
    ) -> Result<Option<Wallet>, RepositoryError> {
        let identity = WalletService::validate_identity(
            tenant_id,
            wallet_type,
            customer_id,
            vendor_id,
            currency,
        )?;
        by_identity(&identity)
            .one(&self.db)
            .await?
            .map(wallet_from_model)
            .transpose()
    }

    /// Current state of a wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound` or a database error.
    pub async fn get_wallet(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Wallet, RepositoryError> {
        let model = scoped(tenant_id, wallet_id)
            .one(&self.db)
            .await?
            .ok_or(WalletError::WalletNotFound(wallet_id))?;
        wallet_from_model(model)
    }

    /// Lists a tenant's wallets, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_wallets(
        &self,
        tenant_id: TenantId,
        filter: &WalletFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Wallet>, RepositoryError> {
        let mut query =
            wallets::Entity::find().filter(wallets::Column::TenantId.eq(tenant_id.into_inner()));
        if let Some(wallet_type) = filter.wallet_type {
            query = query.filter(wallets::Column::WalletType.eq(wallet_type.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(wallets::Column::Status.eq(status.as_str()));
        }
        if let Some(currency) = &filter.currency {
            query = query.filter(wallets::Column::Currency.eq(currency.as_str()));
        }

        let total = query.clone().count(&self.db).await?;
        let wallets = query
            .order_by_asc(wallets::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?
            .into_iter()
            .map(wallet_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(wallets, page, total))
    }

    /// Lists a wallet's entries in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound` or a database error.
    pub async fn list_wallet_entries(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerEntry>, RepositoryError> {
        self.get_wallet(tenant_id, wallet_id).await?;

        let query = wallet_ledger_entries::Entity::find()
            .filter(wallet_ledger_entries::Column::WalletId.eq(wallet_id.into_inner()));
        let total = query.clone().count(&self.db).await?;
        let entries = query
            .order_by_asc(wallet_ledger_entries::Column::Sequence)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?
            .into_iter()
            .map(entry_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(entries, page, total))
    }

    /// Credits a wallet.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn credit(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: MovementInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        WalletService::validate_movement(&input, EntryFamily::Credit)?;
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            WalletAction::Credit,
            &input.idempotency_key,
            None,
            |wallet, _, now| WalletService::plan_credit(wallet, &input, now),
        )
        .await
    }

    /// Debits a wallet. Gated by balance, not by available balance.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn debit(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: MovementInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        WalletService::validate_movement(&input, EntryFamily::Debit)?;
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            WalletAction::Debit,
            &input.idempotency_key,
            None,
            |wallet, _, now| WalletService::plan_debit(wallet, &input, now),
        )
        .await
    }

    /// Places a hold on available funds.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn hold(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        WalletService::validate_hold_request(&input)?;
        let key = input.effective_key(WalletAction::Hold);
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            WalletAction::Hold,
            &key,
            Some(input.hold_id.trim()),
            |wallet, holds, now| WalletService::plan_hold(wallet, holds, &input, now),
        )
        .await
    }

    /// Releases an open hold back to available funds.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn release(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        self.hold_action(tenant_id, wallet_id, WalletAction::Release, input)
            .await
    }

    /// Captures an open hold out of the balance.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn capture(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        input: HoldInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        self.hold_action(tenant_id, wallet_id, WalletAction::Capture, input)
            .await
    }

    async fn hold_action(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        action: WalletAction,
        input: HoldInput,
    ) -> Result<WalletOperationResult, RepositoryError> {
        WalletService::validate_hold_request(&input)?;
        let key = input.effective_key(action);
        self.run_wallet_operation(
            tenant_id,
            wallet_id,
            action,
            &key,
            Some(input.hold_id.trim()),
            |wallet, holds, now| {
                WalletService::plan_hold_action(wallet, holds, action, &input, now)
            },
        )
        .await
    }

    /// Moves funds between two wallets of the same tenant and currency.
    ///
    /// Both rows are locked in ascending id order, so opposite transfers
    /// cannot deadlock. Both entries commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns validation, precondition or database errors.
    pub async fn transfer(
        &self,
        tenant_id: TenantId,
        input: TransferInput,
    ) -> Result<TransferResult, RepositoryError> {
        WalletService::validate_transfer(&input)?;
        let txn = self.db.begin().await?;

        let (from, to) = if input.from_wallet_id < input.to_wallet_id {
            let from = lock_wallet(&txn, tenant_id, input.from_wallet_id).await?;
            let to = lock_wallet(&txn, tenant_id, input.to_wallet_id).await?;
            (from, to)
        } else {
            let to = lock_wallet(&txn, tenant_id, input.to_wallet_id).await?;
            let from = lock_wallet(&txn, tenant_id, input.from_wallet_id).await?;
            (from, to)
        };

        let key = IdempotencyKey::for_wallet(
            tenant_id,
            WalletAction::Transfer.idempotency_scope(),
            input.from_wallet_id,
            &input.idempotency_key,
        );
        if let Some(record) = find_record(&txn, &key).await? {
            debug!(tenant_id = %tenant_id, key = %key.key, "Replaying transfer");
            return replay_transfer(&record);
        }

        let (debit, credit) = WalletService::plan_transfer(&from, &to, &input, Utc::now())
            .inspect_err(|e| {
                warn!(
                    tenant_id = %tenant_id,
                    from_wallet_id = %input.from_wallet_id,
                    to_wallet_id = %input.to_wallet_id,
                    error = %e,
                    "Transfer rejected"
                );
            })?;

        append(&txn, from.version, &debit).await?;
        append(&txn, to.version, &credit).await?;

        let result = TransferResult {
            debit_entry: debit.entry,
            credit_entry: credit.entry,
            from_wallet: debit.wallet.snapshot(),
            to_wallet: credit.wallet.snapshot(),
            is_duplicate: false,
        };
        if !insert_record(&txn, &IdempotencyRecord::new(key, &result)?).await? {
            return Err(WalletError::ConcurrentModification.into());
        }
        txn.commit().await?;

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
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound`, `InvalidStatusTransition`, `WalletNotEmpty`
    /// or a database error.
    pub async fn set_wallet_status(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        status: WalletStatus,
    ) -> Result<Wallet, RepositoryError> {
        let txn = self.db.begin().await?;
        let wallet = lock_wallet(&txn, tenant_id, wallet_id).await?;
        let updated = WalletService::plan_status_change(&wallet, status, Utc::now())?;
        store_wallet(&txn, wallet.version, &updated).await?;
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            wallet_id = %wallet_id,
            from = %wallet.status,
            to = %status,
            "Wallet status changed"
        );
        Ok(updated)
    }

    /// Recomputes balances from the entry log and repairs the cached row.
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound` or a database error.
    pub async fn recalculate_balance(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
    ) -> Result<Reconciliation, RepositoryError> {
        let txn = self.db.begin().await?;
        let wallet = lock_wallet(&txn, tenant_id, wallet_id).await?;
        let entries = wallet_ledger_entries::Entity::find()
            .filter(wallet_ledger_entries::Column::WalletId.eq(wallet_id.into_inner()))
            .order_by_asc(wallet_ledger_entries::Column::Sequence)
            .all(&txn)
            .await?
            .into_iter()
            .map(entry_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = reconcile(&wallet, &entries);
        if !report.is_consistent() {
            warn!(
                tenant_id = %tenant_id,
                wallet_id = %wallet_id,
                balance_discrepancy = %report.balance_discrepancy,
                pending_discrepancy = %report.pending_discrepancy,
                "Wallet cache diverged from ledger entries, repairing"
            );
            let mut repaired = wallet.clone();
            repaired.balance = report.computed_balance;
            repaired.pending_balance = report.computed_pending_balance;
            repaired.version += 1;
            repaired.updated_at = Utc::now();
            store_wallet(&txn, wallet.version, &repaired).await?;
            report.repaired = true;
        }
        txn.commit().await?;
        Ok(report)
    }

    /// Runs one single-wallet mutation under the wallet row lock.
    ///
    /// Hold operations pass their hold id so only that hold's entries are
    /// loaded into the book handed to `plan`.
    async fn run_wallet_operation<F>(
        &self,
        tenant_id: TenantId,
        wallet_id: WalletId,
        action: WalletAction,
        idempotency_key: &str,
        hold_id: Option<&str>,
        plan: F,
    ) -> Result<WalletOperationResult, RepositoryError>
    where
        F: FnOnce(&Wallet, &HoldBook, DateTime<Utc>) -> Result<AppliedEntry, WalletError>,
    {
        let txn = self.db.begin().await?;
        let wallet = lock_wallet(&txn, tenant_id, wallet_id).await?;

        let key = IdempotencyKey::for_wallet(
            tenant_id,
            action.idempotency_scope(),
            wallet_id,
            idempotency_key,
        );
        if let Some(record) = find_record(&txn, &key).await? {
            debug!(
                wallet_id = %wallet_id,
                action = %action,
                key = %key.key,
                "Replaying wallet operation"
            );
            return replay_single(&record);
        }

        let holds = match hold_id {
            Some(hold_id) => load_hold(&txn, wallet_id, hold_id).await?,
            None => HoldBook::default(),
        };

        let applied = plan(&wallet, &holds, Utc::now()).inspect_err(|e| {
            warn!(
                tenant_id = %tenant_id,
                wallet_id = %wallet_id,
                action = %action,
                error = %e,
                "Wallet operation rejected"
            );
        })?;
        append(&txn, wallet.version, &applied).await?;

        let result = WalletOperationResult {
            entry: applied.entry,
            wallet: applied.wallet.snapshot(),
            is_duplicate: false,
        };
        if !insert_record(&txn, &IdempotencyRecord::new(key, &result)?).await? {
            return Err(WalletError::ConcurrentModification.into());
        }
        txn.commit().await?;

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

//! Financial period repository.
//!
//! Postings take a shared row lock on their period; close and reopen take
//! an exclusive one, so a close waits for in-flight postings and a posting
//! never lands in a period closed under it.

use chrono::Utc;
use coffer_core::period::{FinancialPeriod, PeriodCode, PeriodError};
use coffer_shared::config::LedgerConfig;
use coffer_shared::types::{TenantId, UserId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use super::error::RepositoryError;
use super::mapping::{period_active_model, period_from_model};
use crate::entities::financial_periods;

/// Creates the period OPEN unless it already exists.
pub(crate) async fn insert_period_if_missing<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    code: PeriodCode,
) -> Result<(), RepositoryError> {
    let inserted = financial_periods::Entity::insert(period_active_model(&FinancialPeriod::open(
        tenant_id,
        code,
        Utc::now(),
    )))
    .on_conflict(
        OnConflict::columns([
            financial_periods::Column::TenantId,
            financial_periods::Column::Code,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    if inserted == 1 {
        info!(tenant_id = %tenant_id, period = %code, "Period opened");
    }
    Ok(())
}

fn find_period(
    tenant_id: TenantId,
    code: PeriodCode,
) -> sea_orm::Select<financial_periods::Entity> {
    financial_periods::Entity::find()
        .filter(financial_periods::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(financial_periods::Column::Code.eq(code.to_string()))
}

/// Share-locks the period covering a posting and checks that it is OPEN.
///
/// Must run inside the posting's transaction.
pub(crate) async fn lock_open_period<C: ConnectionTrait>(
    conn: &C,
    config: &LedgerConfig,
    tenant_id: TenantId,
    code: PeriodCode,
) -> Result<FinancialPeriod, RepositoryError> {
    if config.auto_create_periods {
        insert_period_if_missing(conn, tenant_id, code).await?;
    }
    let model = find_period(tenant_id, code)
        .lock_shared()
        .one(conn)
        .await?
        .ok_or(PeriodError::PeriodNotFound(code))?;
    let period = period_from_model(model)?;
    period.ensure_open()?;
    Ok(period)
}

/// Period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Returns the period, creating it OPEN if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn ensure_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<FinancialPeriod, RepositoryError> {
        insert_period_if_missing(&self.db, tenant_id, code).await?;
        self.get_period(tenant_id, code).await
    }

    /// The period covering now.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn current_period(
        &self,
        tenant_id: TenantId,
    ) -> Result<FinancialPeriod, RepositoryError> {
        self.ensure_period(tenant_id, PeriodCode::current(Utc::now()))
            .await
    }

    /// Looks up a period.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` or a database error.
    pub async fn get_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<FinancialPeriod, RepositoryError> {
        let model = find_period(tenant_id, code)
            .one(&self.db)
            .await?
            .ok_or(PeriodError::PeriodNotFound(code))?;
        period_from_model(model)
    }

    /// All periods of a tenant, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_periods(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<FinancialPeriod>, RepositoryError> {
        financial_periods::Entity::find()
            .filter(financial_periods::Column::TenantId.eq(tenant_id.into_inner()))
            .order_by_asc(financial_periods::Column::Code)
            .all(&self.db)
            .await?
            .into_iter()
            .map(period_from_model)
            .collect()
    }

    /// OPEN → CLOSED.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` (when auto-creation is off),
    /// `PeriodAlreadyClosed` or a database error.
    pub async fn close_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
        closed_by: Option<UserId>,
    ) -> Result<FinancialPeriod, RepositoryError> {
        let txn = self.db.begin().await?;
        if self.config.auto_create_periods {
            insert_period_if_missing(&txn, tenant_id, code).await?;
        }
        let model = find_period(tenant_id, code)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(PeriodError::PeriodNotFound(code))?;

        let mut period = period_from_model(model.clone())?;
        period.close(closed_by, Utc::now())?;
        let updated = store_status(&txn, model, &period).await?;
        txn.commit().await?;

        info!(tenant_id = %tenant_id, period = %code, "Period closed");
        Ok(updated)
    }

    /// CLOSED → OPEN.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound`, `PeriodAlreadyOpen` or a database error.
    pub async fn reopen_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<FinancialPeriod, RepositoryError> {
        let txn = self.db.begin().await?;
        let model = find_period(tenant_id, code)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(PeriodError::PeriodNotFound(code))?;

        let mut period = period_from_model(model.clone())?;
        period.reopen(Utc::now())?;
        let updated = store_status(&txn, model, &period).await?;
        txn.commit().await?;

        info!(tenant_id = %tenant_id, period = %code, "Period reopened");
        Ok(updated)
    }
}

async fn store_status<C: ConnectionTrait>(
    conn: &C,
    model: financial_periods::Model,
    period: &FinancialPeriod,
) -> Result<FinancialPeriod, RepositoryError> {
    let mut active: financial_periods::ActiveModel = model.into();
    active.status = Set(period.status.as_str().to_string());
    active.closed_at = Set(period.closed_at.map(Into::into));
    active.closed_by = Set(period.closed_by.map(UserId::into_inner));
    active.reopened_at = Set(period.reopened_at.map(Into::into));
    active.updated_at = Set(period.updated_at.into());
    period_from_model(active.update(conn).await?)
}

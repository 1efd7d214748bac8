//! Period management of the embedded engine.

use chrono::Utc;
use coffer_shared::types::{TenantId, UserId};
use tokio::sync::OwnedRwLockReadGuard;
use tracing::info;

use super::{LedgerEngine, PeriodTable};
use crate::period::{FinancialPeriod, PeriodCode, PeriodError};

impl LedgerEngine {
    /// Returns the period, creating it OPEN if it does not exist yet.
    pub async fn ensure_period(&self, tenant_id: TenantId, code: PeriodCode) -> FinancialPeriod {
        let table = self.period_table(tenant_id);
        if let Some(period) = table.read().await.get(&code) {
            return period.clone();
        }

        let mut periods = table.write().await;
        periods
            .entry(code)
            .or_insert_with(|| {
                info!(tenant_id = %tenant_id, period = %code, "Period opened");
                FinancialPeriod::open(tenant_id, code, Utc::now())
            })
            .clone()
    }

    /// The period covering now.
    pub async fn current_period(&self, tenant_id: TenantId) -> FinancialPeriod {
        self.ensure_period(tenant_id, PeriodCode::current(Utc::now()))
            .await
    }

    /// Looks up a period.
    pub async fn get_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<FinancialPeriod, PeriodError> {
        self.period_table(tenant_id)
            .read()
            .await
            .get(&code)
            .cloned()
            .ok_or(PeriodError::PeriodNotFound(code))
    }

    /// All known periods of a tenant, oldest first.
    pub async fn list_periods(&self, tenant_id: TenantId) -> Vec<FinancialPeriod> {
        self.period_table(tenant_id)
            .read()
            .await
            .values()
            .cloned()
            .collect()
    }

    /// OPEN → CLOSED.
    ///
    /// A period that was never opened is created first when
    /// `auto_create_periods` is on, so future months can be closed ahead.
    pub async fn close_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
        closed_by: Option<UserId>,
    ) -> Result<FinancialPeriod, PeriodError> {
        let table = self.period_table(tenant_id);
        let mut periods = table.write().await;
        let now = Utc::now();

        if !periods.contains_key(&code) {
            if !self.config.auto_create_periods {
                return Err(PeriodError::PeriodNotFound(code));
            }
            periods.insert(code, FinancialPeriod::open(tenant_id, code, now));
        }
        let period = periods
            .get_mut(&code)
            .ok_or(PeriodError::PeriodNotFound(code))?;
        period.close(closed_by, now)?;

        info!(tenant_id = %tenant_id, period = %code, "Period closed");
        Ok(period.clone())
    }

    /// CLOSED → OPEN.
    pub async fn reopen_period(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<FinancialPeriod, PeriodError> {
        let table = self.period_table(tenant_id);
        let mut periods = table.write().await;
        let period = periods
            .get_mut(&code)
            .ok_or(PeriodError::PeriodNotFound(code))?;
        period.reopen(Utc::now())?;

        info!(tenant_id = %tenant_id, period = %code, "Period reopened");
        Ok(period.clone())
    }

    /// Read guard over the period table, taken only if `code` is OPEN.
    ///
    /// Postings hold the guard until they commit so a concurrent close
    /// waits for them.
    pub(super) async fn open_period_guard(
        &self,
        tenant_id: TenantId,
        code: PeriodCode,
    ) -> Result<OwnedRwLockReadGuard<PeriodTable>, PeriodError> {
        let table = self.period_table(tenant_id);
        let missing = !table.read().await.contains_key(&code);
        if missing {
            if !self.config.auto_create_periods {
                return Err(PeriodError::PeriodNotFound(code));
            }
            self.ensure_period(tenant_id, code).await;
        }

        let guard = table.read_owned().await;
        guard
            .get(&code)
            .ok_or(PeriodError::PeriodNotFound(code))?
            .ensure_open()?;
        Ok(guard)
    }
}

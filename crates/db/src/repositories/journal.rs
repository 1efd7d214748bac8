//! Journal repository: chart of accounts, postings, voids and reports.
//!
//! # Locking
//!
//! Every posting locks the tenant's `journal_sequences` row first. That row
//! hands out entry numbers and serializes all postings of one tenant, so
//! numbers are gapless and account balances are updated by one writer at a
//! time. The period row is then share-locked and the tenant's accounts are
//! locked `FOR UPDATE` in code order.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use coffer_core::idempotency::{IdempotencyKey, IdempotencyRecord, IdempotencyScope};
use coffer_core::journal::{
    DEFAULT_CHART, EntryHeader, EventPostingInput, EventType, IntegrityReport, JournalEntry,
    JournalEntryFilter, JournalError, JournalLineInput, JournalService, LedgerAccount,
    ManualEntryInput, PostingResult, ReversalService, SourceType, TrialBalance, VoidInput,
    VoidResult, lines_for_event, parse_payload, verify_entry,
};
use coffer_core::period::PeriodCode;
use coffer_shared::config::LedgerConfig;
use coffer_shared::types::{JournalEntryId, PageRequest, PageResponse, TenantId, UserId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::RepositoryError;
use super::idempotency::{find_record, insert_record};
use super::mapping::{
    account_active_model, account_from_model, journal_entry_active_model,
    journal_entry_from_models, journal_line_active_models,
};
use super::period::lock_open_period;
use crate::entities::{journal_entries, journal_lines, journal_sequences, ledger_accounts};

type AccountBook = BTreeMap<String, LedgerAccount>;

/// Journal repository.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

fn accounts_of(tenant_id: TenantId) -> Select<ledger_accounts::Entity> {
    ledger_accounts::Entity::find()
        .filter(ledger_accounts::Column::TenantId.eq(tenant_id.into_inner()))
        .order_by_asc(ledger_accounts::Column::Code)
}

fn entries_of(tenant_id: TenantId) -> Select<journal_entries::Entity> {
    journal_entries::Entity::find()
        .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()))
}

async fn load_accounts<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    for_update: bool,
) -> Result<AccountBook, RepositoryError> {
    let query = accounts_of(tenant_id);
    let query = if for_update { query.lock_exclusive() } else { query };
    query
        .all(conn)
        .await?
        .into_iter()
        .map(|model| account_from_model(model).map(|account| (account.code.clone(), account)))
        .collect()
}

/// Inserts every default account the tenant is missing.
async fn seed_missing<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let mut created = 0;
    for template in DEFAULT_CHART {
        created += ledger_accounts::Entity::insert(account_active_model(
            &LedgerAccount::from_template(tenant_id, template, now),
        ))
        .on_conflict(
            OnConflict::columns([ledger_accounts::Column::TenantId, ledger_accounts::Column::Code])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    }
    Ok(created)
}

/// Locks the tenant's numbering row and returns the last issued number.
async fn lock_book(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<i64, RepositoryError> {
    journal_sequences::Entity::insert(journal_sequences::ActiveModel {
        tenant_id: Set(tenant_id.into_inner()),
        last_number: Set(0),
        updated_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::column(journal_sequences::Column::TenantId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(txn)
    .await?;

    let row = journal_sequences::Entity::find_by_id(tenant_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| JournalError::Storage("journal sequence row missing".to_string()))?;
    Ok(row.last_number)
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    entry_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<journal_lines::Model>>, RepositoryError> {
    let mut grouped: HashMap<Uuid, Vec<journal_lines::Model>> = HashMap::new();
    if entry_ids.is_empty() {
        return Ok(grouped);
    }
    for line in journal_lines::Entity::find()
        .filter(journal_lines::Column::JournalEntryId.is_in(entry_ids))
        .all(conn)
        .await?
    {
        grouped.entry(line.journal_entry_id).or_default().push(line);
    }
    Ok(grouped)
}

async fn assemble<C: ConnectionTrait>(
    conn: &C,
    header: journal_entries::Model,
) -> Result<JournalEntry, RepositoryError> {
    let lines = load_lines(conn, vec![header.id])
        .await?
        .remove(&header.id)
        .unwrap_or_default();
    journal_entry_from_models(header, lines)
}

fn replay_posting(record: &IdempotencyRecord) -> Result<PostingResult, RepositoryError> {
    let mut result: PostingResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

impl JournalRepository {
    /// Creates a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Seeds the default chart of accounts. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn seed_chart_of_accounts(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<LedgerAccount>, RepositoryError> {
        let created = seed_missing(&self.db, tenant_id, Utc::now()).await?;
        if created > 0 {
            info!(tenant_id = %tenant_id, created, "Chart of accounts seeded");
        }
        self.list_accounts(tenant_id).await
    }

    /// A tenant's ledger accounts, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<LedgerAccount>, RepositoryError> {
        Ok(load_accounts(&self.db, tenant_id, false)
            .await?
            .into_values()
            .collect())
    }

    /// Activates or deactivates an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or a database error.
    pub async fn set_account_active(
        &self,
        tenant_id: TenantId,
        code: &str,
        is_active: bool,
    ) -> Result<LedgerAccount, RepositoryError> {
        let txn = self.db.begin().await?;
        let model = accounts_of(tenant_id)
            .filter(ledger_accounts::Column::Code.eq(code))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| JournalError::AccountNotFound(code.to_string()))?;

        let mut account = account_from_model(model)?;
        account.is_active = is_active;
        account.version += 1;
        account.updated_at = Utc::now();
        account_active_model(&account).update(&txn).await?;
        txn.commit().await?;

        info!(tenant_id = %tenant_id, code, is_active, "Account activation changed");
        Ok(account)
    }

    /// Validates and posts a manual entry.
    ///
    /// # Errors
    ///
    /// Returns validation, period or database errors.
    pub async fn post_manual_entry(
        &self,
        tenant_id: TenantId,
        input: ManualEntryInput,
    ) -> Result<PostingResult, RepositoryError> {
        let header = EntryHeader {
            tenant_id,
            entry_date: input.entry_date,
            description: input.description.trim().to_string(),
            source_type: SourceType::Manual,
            source_id: None,
            event_id: None,
            reverses_entry_id: None,
            created_by: input.created_by,
        };

        let txn = self.db.begin().await?;
        let entry = self
            .post(&txn, header, &input.lines, false)
            .await
            .inspect_err(|e| {
                warn!(tenant_id = %tenant_id, error = %e, "Manual entry rejected");
            })?;
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            entry_number = %entry.entry_number,
            total = %entry.total_debit,
            "Manual journal entry posted"
        );
        Ok(PostingResult {
            entry,
            is_duplicate: false,
        })
    }

    /// Posts a business event through its template.
    ///
    /// Replays by `source_id` return the first posting unchanged, whatever
    /// `event_id` they carry.
    ///
    /// # Errors
    ///
    /// Returns validation, period or database errors.
    pub async fn post_event(
        &self,
        tenant_id: TenantId,
        input: EventPostingInput,
    ) -> Result<PostingResult, RepositoryError> {
        let source_id = input.source_id.trim();
        if source_id.is_empty() {
            return Err(JournalError::SourceIdRequired.into());
        }
        let event_id = input.event_id.trim();
        if event_id.is_empty() {
            return Err(JournalError::EventIdRequired.into());
        }
        let event_type: EventType = input.event_type.parse()?;
        let payload = parse_payload(&input.payload)?;

        let txn = self.db.begin().await?;
        let last_number = lock_book(&txn, tenant_id).await?;

        let key = IdempotencyKey::for_tenant(tenant_id, IdempotencyScope::EventPosting, source_id);
        if let Some(record) = find_record(&txn, &key).await? {
            debug!(tenant_id = %tenant_id, source_id, event_id, "Replaying event posting");
            return replay_posting(&record);
        }

        let (description, line_inputs) = lines_for_event(event_type, source_id, &payload)?;
        let header = EntryHeader {
            tenant_id,
            entry_date: input.entry_date.unwrap_or_else(|| Utc::now().date_naive()),
            description,
            source_type: SourceType::Event(event_type),
            source_id: Some(source_id.to_string()),
            event_id: Some(event_id.to_string()),
            reverses_entry_id: None,
            created_by: input.created_by,
        };
        let entry = self
            .post_locked(&txn, last_number, header, &line_inputs, false)
            .await
            .inspect_err(|e| {
                warn!(tenant_id = %tenant_id, source_id, error = %e, "Event posting rejected");
            })?;

        let result = PostingResult {
            entry,
            is_duplicate: false,
        };
        if !insert_record(&txn, &IdempotencyRecord::new(key, &result)?).await? {
            return Err(JournalError::ConcurrentModification.into());
        }
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            event_type = %event_type,
            source_id,
            entry_number = %result.entry.entry_number,
            "Event journal entry posted"
        );
        Ok(result)
    }

    /// The entry posted for a business source id, in its current state.
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` or a database error.
    pub async fn lookup_by_source(
        &self,
        tenant_id: TenantId,
        source_id: &str,
    ) -> Result<JournalEntry, RepositoryError> {
        let source_id = source_id.trim();
        let header = entries_of(tenant_id)
            .filter(journal_entries::Column::SourceId.eq(source_id))
            .filter(
                journal_entries::Column::SourceType
                    .is_not_in([SourceType::Manual.as_str(), SourceType::Reversal.as_str()]),
            )
            .one(&self.db)
            .await?
            .ok_or_else(|| JournalError::SourceNotFound(source_id.to_string()))?;
        assemble(&self.db, header).await
    }

    /// Voids a posted entry by posting its mirror image today.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `AlreadyVoided`, `CannotVoidReversal`,
    /// `PeriodClosed` or a database error.
    pub async fn void_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        input: VoidInput,
    ) -> Result<VoidResult, RepositoryError> {
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(JournalError::ReasonRequired.into());
        }

        let txn = self.db.begin().await?;
        let last_number = lock_book(&txn, tenant_id).await?;
        let header = entries_of(tenant_id)
            .filter(journal_entries::Column::Id.eq(entry_id.into_inner()))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(JournalError::NotFound(entry_id))?;
        let mut original = assemble(&txn, header.clone()).await?;
        JournalService::validate_can_void(&original, reason)?;

        let now = Utc::now();
        let plan = ReversalService::plan(&original, reason, now.date_naive(), input.voided_by);
        let reversal = self
            .post_locked(&txn, last_number, plan.header, &plan.lines, true)
            .await?;

        JournalService::mark_voided(&mut original, &reversal, reason, input.voided_by, now);
        let mut active: journal_entries::ActiveModel = header.into();
        active.status = Set(original.status.as_str().to_string());
        active.void_reason = Set(original.void_reason.clone());
        active.voided_at = Set(original.voided_at.map(Into::into));
        active.voided_by = Set(original.voided_by.map(UserId::into_inner));
        active.reversed_by_entry_id =
            Set(original.reversed_by_entry_id.map(JournalEntryId::into_inner));
        active.update(&txn).await?;
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            entry_number = %original.entry_number,
            reversal_number = %reversal.entry_number,
            "Journal entry voided"
        );
        Ok(VoidResult { original, reversal })
    }

    /// Recomputes an entry's totals and checks its account references.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a database error.
    pub async fn verify_integrity(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
    ) -> Result<IntegrityReport, RepositoryError> {
        let entry = self.get_entry(tenant_id, entry_id).await?;
        let codes: HashSet<String> = load_accounts(&self.db, tenant_id, false)
            .await?
            .into_keys()
            .collect();
        let report = verify_entry(&entry, |code| codes.contains(code));
        if !report.is_valid {
            warn!(
                tenant_id = %tenant_id,
                entry_id = %entry_id,
                "Journal entry failed integrity check"
            );
        }
        Ok(report)
    }

    /// Looks up a journal entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a database error.
    pub async fn get_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
    ) -> Result<JournalEntry, RepositoryError> {
        let header = entries_of(tenant_id)
            .filter(journal_entries::Column::Id.eq(entry_id.into_inner()))
            .one(&self.db)
            .await?
            .ok_or(JournalError::NotFound(entry_id))?;
        assemble(&self.db, header).await
    }

    /// Lists journal entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: &JournalEntryFilter,
        page: PageRequest,
    ) -> Result<PageResponse<JournalEntry>, RepositoryError> {
        let mut query = entries_of(tenant_id);
        if let Some(status) = filter.status {
            query = query.filter(journal_entries::Column::Status.eq(status.as_str()));
        }
        if let Some(source_type) = filter.source_type {
            query = query.filter(journal_entries::Column::SourceType.eq(source_type.as_str()));
        }
        if let Some(period) = filter.period_code {
            query = query.filter(journal_entries::Column::PeriodCode.eq(period.to_string()));
        }

        let total = query.clone().count(&self.db).await?;
        let headers = query
            .order_by_desc(journal_entries::Column::Sequence)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        let mut lines = load_lines(&self.db, headers.iter().map(|h| h.id).collect()).await?;
        let entries = headers
            .into_iter()
            .map(|header| {
                let entry_lines = lines.remove(&header.id).unwrap_or_default();
                journal_entry_from_models(header, entry_lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(entries, page, total))
    }

    /// Trial balance over the tenant's accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn trial_balance(
        &self,
        tenant_id: TenantId,
    ) -> Result<TrialBalance, RepositoryError> {
        let accounts = self.list_accounts(tenant_id).await?;
        Ok(TrialBalance::from_accounts(&accounts))
    }

    async fn post(
        &self,
        txn: &DatabaseTransaction,
        header: EntryHeader,
        lines: &[JournalLineInput],
        reversal: bool,
    ) -> Result<JournalEntry, RepositoryError> {
        let last_number = lock_book(txn, header.tenant_id).await?;
        self.post_locked(txn, last_number, header, lines, reversal)
            .await
    }

    /// Validates, gates and writes one entry. The caller holds the book lock.
    ///
    /// Order: seed on first use, line validation, period gate, then writes.
    async fn post_locked(
        &self,
        txn: &DatabaseTransaction,
        last_number: i64,
        header: EntryHeader,
        lines: &[JournalLineInput],
        reversal: bool,
    ) -> Result<JournalEntry, RepositoryError> {
        let tenant_id = header.tenant_id;
        let now = Utc::now();

        let mut accounts = load_accounts(txn, tenant_id, true).await?;
        if accounts.is_empty() && self.config.seed_chart_on_first_use {
            let created = seed_missing(txn, tenant_id, now).await?;
            info!(tenant_id = %tenant_id, created, "Chart of accounts seeded on first use");
            accounts = load_accounts(txn, tenant_id, true).await?;
        }

        let lookup = |code: &str| accounts.get(code).map(LedgerAccount::info);
        let (lines, totals) = if reversal {
            JournalService::validate_reversal_lines(lines, lookup)?
        } else {
            JournalService::validate_lines(lines, lookup)?
        };
        let period = PeriodCode::from_date(header.entry_date);
        lock_open_period(txn, &self.config, tenant_id, period).await?;

        let next_number = last_number + 1;
        let sequence = u64::try_from(next_number).map_err(|_| RepositoryError::CorruptRow {
            column: "last_number",
            value: last_number.to_string(),
        })?;
        let entry = JournalService::build_entry(header, lines, totals, sequence, now);

        let deltas = JournalService::account_deltas(&entry, |code| {
            accounts.get(code).map(LedgerAccount::info)
        })?;
        let mut touched = Vec::new();
        for delta in deltas {
            if let Some(account) = accounts.get_mut(&delta.account_code) {
                account.apply_line(delta.side, delta.amount, entry.period_code, now);
                touched.push(delta.account_code);
            }
        }
        touched.sort();
        touched.dedup();
        for code in &touched {
            if let Some(account) = accounts.get(code) {
                account_active_model(account).update(txn).await?;
            }
        }

        journal_entry_active_model(&entry, next_number).insert(txn).await?;
        journal_lines::Entity::insert_many(journal_line_active_models(&entry))
            .exec_without_returning(txn)
            .await?;
        journal_sequences::ActiveModel {
            tenant_id: Set(tenant_id.into_inner()),
            last_number: Set(next_number),
            updated_at: Set(now.into()),
        }
        .update(txn)
        .await?;

        Ok(entry)
    }
}

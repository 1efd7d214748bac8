//! Journal operations of the embedded engine.

use chrono::{DateTime, Utc};
use coffer_shared::types::{JournalEntryId, PageRequest, PageResponse, TenantId};
use tracing::{debug, info, warn};

use super::{LedgerEngine, TenantBook};
use crate::idempotency::{IdempotencyKey, IdempotencyRecord, IdempotencyScope};
use crate::journal::{
    DEFAULT_CHART, EntryHeader, EventPostingInput, EventType, IntegrityReport, JournalEntry,
    JournalEntryFilter, JournalError, JournalLine, JournalLineInput, JournalService, JournalTotals,
    LedgerAccount, ManualEntryInput, PostingResult, ReversalService, SourceType, TrialBalance,
    VoidInput, VoidResult, lines_for_event, parse_payload, verify_entry,
};
use crate::period::PeriodCode;

impl TenantBook {
    /// Adds any default account that is missing. Returns how many were added.
    fn seed(&mut self, tenant_id: TenantId, now: DateTime<Utc>) -> usize {
        let mut created = 0;
        for template in DEFAULT_CHART {
            if !self.accounts.contains_key(template.code) {
                self.accounts.insert(
                    template.code.to_string(),
                    LedgerAccount::from_template(tenant_id, template, now),
                );
                created += 1;
            }
        }
        created
    }

    fn validate(
        &self,
        lines: &[JournalLineInput],
        reversal: bool,
    ) -> Result<(Vec<JournalLine>, JournalTotals), JournalError> {
        let lookup = |code: &str| self.accounts.get(code).map(LedgerAccount::info);
        if reversal {
            JournalService::validate_reversal_lines(lines, lookup)
        } else {
            JournalService::validate_lines(lines, lookup)
        }
    }

    /// Builds the next entry without changing the book.
    fn stage(
        &self,
        header: EntryHeader,
        lines: Vec<JournalLine>,
        totals: JournalTotals,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        JournalService::build_entry(header, lines, totals, self.next_number + 1, now)
    }

    /// Appends a staged entry and applies its lines to the accounts.
    fn commit(&mut self, entry: JournalEntry, now: DateTime<Utc>) -> Result<(), JournalError> {
        let deltas = JournalService::account_deltas(&entry, |code| {
            self.accounts.get(code).map(LedgerAccount::info)
        })?;
        for delta in deltas {
            if let Some(account) = self.accounts.get_mut(&delta.account_code) {
                account.apply_line(delta.side, delta.amount, entry.period_code, now);
            }
        }

        self.next_number += 1;
        if let (SourceType::Event(_), Some(source_id)) = (entry.source_type, &entry.source_id) {
            self.by_source.insert(source_id.clone(), entry.id);
        }
        self.index.insert(entry.id, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn entry(&self, id: JournalEntryId) -> Result<&JournalEntry, JournalError> {
        self.index
            .get(&id)
            .and_then(|&i| self.entries.get(i))
            .ok_or(JournalError::NotFound(id))
    }
}

fn replay_posting(record: &IdempotencyRecord) -> Result<PostingResult, JournalError> {
    let mut result: PostingResult = record.decode()?;
    result.is_duplicate = true;
    Ok(result)
}

impl LedgerEngine {
    /// Seeds the default chart of accounts. Safe to call repeatedly.
    pub async fn seed_chart_of_accounts(&self, tenant_id: TenantId) -> Vec<LedgerAccount> {
        let book = self.book(tenant_id);
        let mut book = book.lock().await;
        let created = book.seed(tenant_id, Utc::now());
        if created > 0 {
            info!(tenant_id = %tenant_id, created, "Chart of accounts seeded");
        }
        book.accounts.values().cloned().collect()
    }

    /// A tenant's ledger accounts, ordered by code.
    pub async fn list_accounts(&self, tenant_id: TenantId) -> Vec<LedgerAccount> {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        book.accounts.values().cloned().collect()
    }

    /// Activates or deactivates an account. Inactive accounts reject new
    /// postings but can still be reversed.
    pub async fn set_account_active(
        &self,
        tenant_id: TenantId,
        code: &str,
        is_active: bool,
    ) -> Result<LedgerAccount, JournalError> {
        let book = self.book(tenant_id);
        let mut book = book.lock().await;
        let account = book
            .accounts
            .get_mut(code)
            .ok_or_else(|| JournalError::AccountNotFound(code.to_string()))?;
        account.is_active = is_active;
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    /// Validates and posts a manual entry.
    pub async fn post_manual_entry(
        &self,
        tenant_id: TenantId,
        input: ManualEntryInput,
    ) -> Result<PostingResult, JournalError> {
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

        let book = self.book(tenant_id);
        let mut book = book.lock().await;
        let now = Utc::now();
        self.seed_on_first_use(&mut book, tenant_id, now);

        let (lines, totals) = book.validate(&input.lines, false).inspect_err(|e| {
            warn!(tenant_id = %tenant_id, error = %e, "Manual entry rejected");
        })?;
        let period = PeriodCode::from_date(input.entry_date);
        let _gate = self.open_period_guard(tenant_id, period).await.inspect_err(|e| {
            warn!(tenant_id = %tenant_id, period = %period, error = %e, "Manual entry rejected");
        })?;

        let entry = book.stage(header, lines, totals, now);
        book.commit(entry.clone(), now)?;
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
    pub async fn post_event(
        &self,
        tenant_id: TenantId,
        input: EventPostingInput,
    ) -> Result<PostingResult, JournalError> {
        let source_id = input.source_id.trim();
        if source_id.is_empty() {
            return Err(JournalError::SourceIdRequired);
        }
        let event_id = input.event_id.trim();
        if event_id.is_empty() {
            return Err(JournalError::EventIdRequired);
        }
        let event_type: EventType = input.event_type.parse()?;
        let payload = parse_payload(&input.payload)?;

        let book = self.book(tenant_id);
        let mut book = book.lock().await;

        let key = IdempotencyKey::for_tenant(tenant_id, IdempotencyScope::EventPosting, source_id);
        if let Some(record) = self.idempotency.get(&key).await? {
            debug!(tenant_id = %tenant_id, source_id, event_id, "Replaying event posting");
            return replay_posting(&record);
        }

        let (description, line_inputs) = lines_for_event(event_type, source_id, &payload)?;
        let now = Utc::now();
        self.seed_on_first_use(&mut book, tenant_id, now);

        let (lines, totals) = book.validate(&line_inputs, false).inspect_err(|e| {
            warn!(tenant_id = %tenant_id, source_id, error = %e, "Event posting rejected");
        })?;
        let entry_date = input.entry_date.unwrap_or_else(|| now.date_naive());
        let period = PeriodCode::from_date(entry_date);
        let _gate = self.open_period_guard(tenant_id, period).await.inspect_err(|e| {
            warn!(
                tenant_id = %tenant_id,
                source_id,
                period = %period,
                error = %e,
                "Event posting rejected"
            );
        })?;

        let header = EntryHeader {
            tenant_id,
            entry_date,
            description,
            source_type: SourceType::Event(event_type),
            source_id: Some(source_id.to_string()),
            event_id: Some(event_id.to_string()),
            reverses_entry_id: None,
            created_by: input.created_by,
        };
        let entry = book.stage(header, lines, totals, now);
        let result = PostingResult {
            entry: entry.clone(),
            is_duplicate: false,
        };
        let record = IdempotencyRecord::new(key, &result)?;
        if let Some(existing) = self.idempotency.put_if_absent(record).await? {
            return replay_posting(&existing);
        }
        book.commit(entry, now)?;

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
    pub async fn lookup_by_source(
        &self,
        tenant_id: TenantId,
        source_id: &str,
    ) -> Result<JournalEntry, JournalError> {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        let source_id = source_id.trim();
        let id = book
            .by_source
            .get(source_id)
            .copied()
            .ok_or_else(|| JournalError::SourceNotFound(source_id.to_string()))?;
        book.entry(id).cloned()
    }

    /// Voids a posted entry by posting its mirror image today.
    pub async fn void_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        input: VoidInput,
    ) -> Result<VoidResult, JournalError> {
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(JournalError::ReasonRequired);
        }

        let book = self.book(tenant_id);
        let mut book = book.lock().await;
        let original = book.entry(entry_id)?.clone();
        JournalService::validate_can_void(&original, reason)?;

        let now = Utc::now();
        let today = now.date_naive();
        let plan = ReversalService::plan(&original, reason, today, input.voided_by);
        let (lines, totals) = book.validate(&plan.lines, true)?;
        let _gate = self
            .open_period_guard(tenant_id, PeriodCode::from_date(today))
            .await?;

        let reversal = book.stage(plan.header, lines, totals, now);
        book.commit(reversal.clone(), now)?;

        let index = book
            .index
            .get(&entry_id)
            .copied()
            .ok_or(JournalError::NotFound(entry_id))?;
        let voided = &mut book.entries[index];
        JournalService::mark_voided(voided, &reversal, reason, input.voided_by, now);
        let original = voided.clone();

        info!(
            tenant_id = %tenant_id,
            entry_number = %original.entry_number,
            reversal_number = %reversal.entry_number,
            "Journal entry voided"
        );
        Ok(VoidResult { original, reversal })
    }

    /// Recomputes an entry's totals and checks its account references.
    pub async fn verify_integrity(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
    ) -> Result<IntegrityReport, JournalError> {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        let entry = book.entry(entry_id)?;
        let report = verify_entry(entry, |code| book.accounts.contains_key(code));
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
    pub async fn get_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
    ) -> Result<JournalEntry, JournalError> {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        book.entry(entry_id).cloned()
    }

    /// Lists journal entries, newest first.
    pub async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: &JournalEntryFilter,
        page: PageRequest,
    ) -> PageResponse<JournalEntry> {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        let matching: Vec<JournalEntry> = book
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        PageResponse::new(page.slice(&matching), page, total)
    }

    /// Trial balance over the tenant's accounts.
    pub async fn trial_balance(&self, tenant_id: TenantId) -> TrialBalance {
        let book = self.book(tenant_id);
        let book = book.lock().await;
        let accounts: Vec<LedgerAccount> = book.accounts.values().cloned().collect();
        TrialBalance::from_accounts(&accounts)
    }

    fn seed_on_first_use(&self, book: &mut TenantBook, tenant_id: TenantId, now: DateTime<Utc>) {
        if self.config.seed_chart_on_first_use && book.accounts.is_empty() {
            let created = book.seed(tenant_id, now);
            info!(tenant_id = %tenant_id, created, "Chart of accounts seeded on first use");
        }
    }
}

//! In-memory idempotency store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore};

/// Idempotency store backed by a concurrent map.
///
/// Used by the embedded engine and in tests. Records live for the lifetime
/// of the process.
#[derive(Debug, Default)]
pub struct MemoryIdempotencyStore {
    records: DashMap<IdempotencyKey, IdempotencyRecord>,
}

impl MemoryIdempotencyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn get(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn put_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        match self.records.entry(record.key.clone()) {
            Entry::Occupied(existing) => Ok(Some(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(None)
            }
        }
    }
}

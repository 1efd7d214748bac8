//! PostgreSQL-backed idempotency store.
//!
//! The wallet and journal repositories read and write records inside their
//! own transactions through [`find_record`] and [`insert_record`].
//! [`PgIdempotencyStore`] exposes the same table through the
//! `IdempotencyStore` trait for callers outside a transaction.

use async_trait::async_trait;
use coffer_core::idempotency::{
    IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyStore,
};
use coffer_shared::types::{TenantId, WalletId};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Set};

use super::error::{RepositoryError, parse_column};
use crate::entities::idempotency_records;

/// Looks up the record for `key`.
pub(crate) async fn find_record<C: ConnectionTrait>(
    conn: &C,
    key: &IdempotencyKey,
) -> Result<Option<IdempotencyRecord>, RepositoryError> {
    idempotency_records::Entity::find_by_id((key.tenant_id.into_inner(), key.storage_key()))
        .one(conn)
        .await?
        .map(record_from_model)
        .transpose()
}

/// Inserts `record`. Returns false if its key was already taken.
pub(crate) async fn insert_record<C: ConnectionTrait>(
    conn: &C,
    record: &IdempotencyRecord,
) -> Result<bool, DbErr> {
    let key = &record.key;
    let model = idempotency_records::ActiveModel {
        tenant_id: Set(key.tenant_id.into_inner()),
        storage_key: Set(key.storage_key()),
        scope: Set(key.scope.as_str().to_string()),
        wallet_id: Set(key.wallet_id.map(WalletId::into_inner)),
        idempotency_key: Set(key.key.clone()),
        response: Set(record.response.clone()),
        created_at: Set(record.created_at.into()),
    };

    let inserted = idempotency_records::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                idempotency_records::Column::TenantId,
                idempotency_records::Column::StorageKey,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(inserted == 1)
}

fn record_from_model(
    model: idempotency_records::Model,
) -> Result<IdempotencyRecord, RepositoryError> {
    Ok(IdempotencyRecord {
        key: IdempotencyKey {
            tenant_id: TenantId::from_uuid(model.tenant_id),
            scope: parse_column("scope", &model.scope)?,
            wallet_id: model.wallet_id.map(WalletId::from_uuid),
            key: model.idempotency_key,
        },
        response: model.response,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    })
}

/// Idempotency store over the `idempotency_records` table.
#[derive(Debug, Clone)]
pub struct PgIdempotencyStore {
    db: DatabaseConnection,
}

impl PgIdempotencyStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn storage_error(err: impl std::fmt::Display) -> IdempotencyError {
    IdempotencyError::Storage(err.to_string())
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn get(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        find_record(&self.db, key).await.map_err(storage_error)
    }

    async fn put_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        if insert_record(&self.db, &record).await.map_err(storage_error)? {
            return Ok(None);
        }
        find_record(&self.db, &record.key)
            .await
            .map_err(storage_error)?
            .map(Some)
            .ok_or_else(|| storage_error("idempotency record vanished after conflict"))
    }
}

//! `SeaORM` Entity for wallets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub wallet_type: String,
    pub customer_id: Option<String>,
    pub vendor_id: Option<String>,
    pub currency: String,
    pub status: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub pending_balance: Decimal,
    pub last_sequence: i64,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_ledger_entries::Entity")]
    WalletLedgerEntries,
}

impl Related<super::wallet_ledger_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletLedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

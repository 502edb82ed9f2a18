//! Wallet entity - The per-user cash balance.
//!
//! There is at most one wallet per user. It is created lazily with a zero balance
//! and is never deleted, only mutated.

use crate::core::money;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Unique identifier for the wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the wallet
    #[sea_orm(unique)]
    pub user_id: String,
    /// Current balance in minor units
    pub balance_cents: i64,
    /// When the wallet was created
    pub created_at: DateTimeUtc,
    /// When the balance last changed
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The balance as a two-decimal value.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        money::from_minor_units(self.balance_cents)
    }
}

/// `Wallet` has no declared relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

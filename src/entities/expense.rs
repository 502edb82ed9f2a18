//! Expense entity - A single recorded expense.
//!
//! Amounts are stored in minor units (`amount_cents`) so sums stay exact.
//! `deduct_from_wallet` records that the owner's wallet was debited by this expense.

use crate::core::money;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the expense, never changes after creation
    pub user_id: String,
    /// Amount in minor units, always positive
    pub amount_cents: i64,
    /// Calendar date the money was spent
    pub date: Date,
    /// Category name
    pub category: String,
    /// Where the money was spent
    pub location: Option<String>,
    /// Free-form note
    pub description: Option<String>,
    /// Whether the amount was deducted from the owner's wallet
    pub deduct_from_wallet: bool,
    /// When the expense was recorded
    pub created_at: DateTimeUtc,
    /// When the expense was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The expense amount as a two-decimal value.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        money::from_minor_units(self.amount_cents)
    }
}

/// `Expense` has no declared relationships; the category join is by name
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

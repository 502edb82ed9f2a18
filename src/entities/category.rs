//! Category entity - Labels that expenses are filed under.
//!
//! Default categories have no `user_id` and are shared by everyone; custom categories
//! belong to one user. Expenses reference a category by `name`, not by `id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, also the join key used by `expenses.category`
    pub name: String,
    /// Hex colour used by charts (e.g. `"#ef4444"`)
    pub color: String,
    /// Whether this is one of the shared default categories
    pub is_default: bool,
    /// Owner for custom categories, None for defaults
    pub user_id: Option<String>,
    /// When the category was created
    pub created_at: DateTimeUtc,
    /// When the category was last modified
    pub updated_at: DateTimeUtc,
}

/// `Category` has no declared relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

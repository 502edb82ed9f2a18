//! User entity - A profile mirrored from the identity provider.
//!
//! The primary key is the provider-issued uid, so it is not auto-incremented.
//! Every other table scopes its rows by this id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Identity-provider uid
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address reported by the provider
    pub email: String,
    /// Optional phone number set from the profile screen
    pub phone: Option<String>,
    /// When the profile was first synced
    pub created_at: DateTimeUtc,
    /// When the profile was last modified
    pub updated_at: DateTimeUtc,
}

/// Users are referenced by `user_id` columns but no foreign keys are declared
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

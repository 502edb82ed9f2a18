//! Category business logic - Default and custom expense categories.
//!
//! Default categories are shared by all users and seeded from configuration. Custom
//! categories belong to one user. Expenses reference categories by name, so renames are
//! carried onto the user's expenses and deletion is refused while any expense still uses
//! the name.

use crate::{
    auth::Session,
    config::settings::DefaultCategory,
    core::expense as expense_ops,
    entities::{Category, category},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Categories visible to a user, split the way the category manager shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryGroups {
    /// Shared default categories
    pub default: Vec<category::Model>,
    /// The user's own categories
    pub custom: Vec<category::Model>,
}

/// Partial update of a custom category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    /// New name
    pub name: Option<String>,
    /// New colour
    pub color: Option<String>,
}

/// Inserts any configured default category whose name is not present yet.
///
/// Returns the number of categories inserted.
pub async fn ensure_default_categories(
    db: &DatabaseConnection,
    defaults: &[DefaultCategory],
) -> Result<usize> {
    let mut existing: Vec<String> = Category::find()
        .filter(category::Column::IsDefault.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();

    let now = Utc::now();
    let mut inserted = 0;
    for default in defaults {
        let name = validate_name(&default.name)?;
        if existing.contains(&name) {
            continue;
        }

        let model = category::ActiveModel {
            name: Set(name.clone()),
            color: Set(validate_color(&default.color)?),
            is_default: Set(true),
            user_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        model.insert(db).await?;
        existing.push(name);
        inserted += 1;
    }

    if inserted > 0 {
        info!(inserted, "Seeded default categories");
    }
    Ok(inserted)
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Category name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Accepts `#rrggbb` hex colours.
fn validate_color(color: &str) -> Result<String> {
    let trimmed = color.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(Error::validation(format!(
            "Category colour '{color}' must look like #rrggbb"
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Condition matching every category the user can see: defaults plus their own.
fn visible_to(user_id: &str) -> Condition {
    Condition::any()
        .add(category::Column::IsDefault.eq(true))
        .add(category::Column::UserId.eq(user_id))
}

/// CRUD over categories with the in-use deletion guard.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    db: DatabaseConnection,
}

impl CategoryStore {
    /// Creates a store over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All categories visible to the user: defaults by name, then custom ones newest first.
    pub async fn list(&self, session: &Session) -> Result<Vec<category::Model>> {
        Category::find()
            .filter(visible_to(&session.user_id))
            .order_by_desc(category::Column::IsDefault)
            .order_by_asc(category::Column::Name)
            .all(&self.db)
            .await
            .map(|mut categories| {
                // Custom categories read newest first
                let split = categories.iter().take_while(|c| c.is_default).count();
                categories[split..].sort_by(|a, b| b.created_at.cmp(&a.created_at));
                categories
            })
            .map_err(Into::into)
    }

    /// Visible categories split into defaults and the user's own.
    pub async fn grouped(&self, session: &Session) -> Result<CategoryGroups> {
        let (default, custom) = self
            .list(session)
            .await?
            .into_iter()
            .partition(|c| c.is_default);
        Ok(CategoryGroups { default, custom })
    }

    /// Finds a visible category by exact name.
    pub async fn find_by_name(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Option<category::Model>> {
        Category::find()
            .filter(visible_to(&session.user_id))
            .filter(category::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Creates a custom category for the user.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn create(
        &self,
        session: &Session,
        name: &str,
        color: &str,
    ) -> Result<category::Model> {
        let name = validate_name(name)?;
        let color = validate_color(color)?;

        if self.find_by_name(session, &name).await?.is_some() {
            return Err(Error::validation(format!(
                "Category '{name}' already exists"
            )));
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            name: Set(name),
            color: Set(color),
            is_default: Set(false),
            user_id: Set(Some(session.user_id.clone())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = model.insert(&self.db).await?;
        info!(category_id = created.id, name = %created.name, "Created category");
        Ok(created)
    }

    /// Renames or recolours one of the user's custom categories.
    ///
    /// A rename is applied to the user's expenses in the same transaction so that they
    /// keep pointing at the category.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn update(
        &self,
        session: &Session,
        category_id: i64,
        patch: &CategoryPatch,
    ) -> Result<category::Model> {
        let new_name = patch.name.as_deref().map(validate_name).transpose()?;
        let new_color = patch.color.as_deref().map(validate_color).transpose()?;

        let existing = self.require_custom(session, category_id).await?;
        let old_name = existing.name.clone();

        if let Some(name) = new_name.as_deref() {
            if name != old_name && self.find_by_name(session, name).await?.is_some() {
                return Err(Error::validation(format!(
                    "Category '{name}' already exists"
                )));
            }
        }

        let txn = self.db.begin().await?;

        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = new_name.clone() {
            active.name = Set(name);
        }
        if let Some(color) = new_color {
            active.color = Set(color);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if let Some(name) = new_name.filter(|name| name != &old_name) {
            let moved =
                expense_ops::rename_category(&txn, &session.user_id, &old_name, &name).await?;
            debug!(moved, from = %old_name, to = %name, "Renamed category on expenses");
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes one of the user's custom categories.
    ///
    /// Fails with [`Error::CategoryInUse`] if any of the user's expenses is filed under the
    /// category's name; nothing is deleted in that case.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn delete(&self, session: &Session, category_id: i64) -> Result<()> {
        let existing = self.require_custom(session, category_id).await?;

        let txn = self.db.begin().await?;

        let in_use =
            expense_ops::count_with_category(&txn, &session.user_id, &existing.name).await?;
        if in_use > 0 {
            return Err(Error::CategoryInUse {
                name: existing.name,
                expense_count: in_use,
            });
        }

        let name = existing.name.clone();
        existing.delete(&txn).await?;
        txn.commit().await?;

        info!(category_id, %name, "Deleted category");
        Ok(())
    }

    /// Loads a category the user may modify. Defaults are refused, other users'
    /// categories are reported missing.
    async fn require_custom(&self, session: &Session, category_id: i64) -> Result<category::Model> {
        let found = Category::find_by_id(category_id)
            .filter(visible_to(&session.user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found("category", category_id))?;

        if found.is_default {
            return Err(Error::PermissionDenied {
                message: format!("Default category '{}' cannot be modified", found.name),
            });
        }
        Ok(found)
    }
}

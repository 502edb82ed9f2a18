//! Expense business logic - Handles plain expense records.
//!
//! The [`ExpenseStore`] covers reads and writes that do not touch the wallet. Anything that
//! changes a wallet-linked amount (or the link itself) goes through
//! [`crate::core::ledger::Ledger`], which wraps the expense write and the balance write in one
//! database transaction. The connection-generic helpers at the bottom of this module are the
//! pieces the ledger runs inside its transactions.

use crate::{
    auth::Session,
    core::money,
    entities::{Expense, expense},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Payload for a new expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Amount spent, must be positive
    pub amount: Decimal,
    /// Calendar date of the expense
    pub date: NaiveDate,
    /// Category name
    pub category: String,
    /// Where the money was spent
    pub location: Option<String>,
    /// Free-form note
    pub description: Option<String>,
    /// Debit the owner's wallet by `amount`
    #[serde(default)]
    pub deduct_from_wallet: bool,
}

impl NewExpense {
    /// Builds a payload with only the required fields set.
    #[must_use]
    pub fn new(amount: Decimal, date: NaiveDate, category: impl Into<String>) -> Self {
        Self {
            amount,
            date,
            category: category.into(),
            location: None,
            description: None,
            deduct_from_wallet: false,
        }
    }

    /// Sets the wallet flag.
    #[must_use]
    pub const fn deducted(mut self, deduct_from_wallet: bool) -> Self {
        self.deduct_from_wallet = deduct_from_wallet;
        self
    }

    pub(crate) fn validate(&self) -> Result<ExpenseDraft> {
        Ok(ExpenseDraft {
            amount_cents: money::positive_minor_units(self.amount)?,
            date: self.date,
            category: validate_category(&self.category)?,
            location: normalize_text(self.location.as_deref()),
            description: normalize_text(self.description.as_deref()),
            deduct_from_wallet: self.deduct_from_wallet,
        })
    }
}

/// Partial update of an expense. `None` leaves a field unchanged; for the optional text
/// fields `Some(None)` clears the value.
///
/// Serialized, an absent text field means "unchanged" and an explicit `null` means
/// "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    /// New amount
    pub amount: Option<Decimal>,
    /// New date
    pub date: Option<NaiveDate>,
    /// New category name
    pub category: Option<String>,
    /// New location
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub location: Option<Option<String>>,
    /// New description
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub description: Option<Option<String>>,
    /// New wallet flag
    pub deduct_from_wallet: Option<bool>,
}

/// Marks a field that appears in the input as present, even when its value is `null`.
fn present_field<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ExpensePatch {
    /// Whether applying this patch could change what the wallet should hold.
    #[must_use]
    pub const fn touches_wallet(&self) -> bool {
        self.amount.is_some() || self.deduct_from_wallet.is_some()
    }

    pub(crate) fn validate(&self) -> Result<PatchDraft> {
        Ok(PatchDraft {
            amount_cents: self.amount.map(money::positive_minor_units).transpose()?,
            date: self.date,
            category: self.category.as_deref().map(validate_category).transpose()?,
            location: self.location.as_ref().map(|l| normalize_text(l.as_deref())),
            description: self
                .description
                .as_ref()
                .map(|d| normalize_text(d.as_deref())),
            deduct_from_wallet: self.deduct_from_wallet,
        })
    }
}

/// A validated [`NewExpense`] with the amount in minor units.
#[derive(Debug, Clone)]
pub(crate) struct ExpenseDraft {
    pub(crate) amount_cents: i64,
    pub(crate) date: NaiveDate,
    pub(crate) category: String,
    pub(crate) location: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) deduct_from_wallet: bool,
}

/// A validated [`ExpensePatch`].
#[derive(Debug, Clone, Default)]
pub(crate) struct PatchDraft {
    pub(crate) amount_cents: Option<i64>,
    pub(crate) date: Option<NaiveDate>,
    pub(crate) category: Option<String>,
    pub(crate) location: Option<Option<String>>,
    pub(crate) description: Option<Option<String>>,
    pub(crate) deduct_from_wallet: Option<bool>,
}

fn validate_category(category: &str) -> Result<String> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Expense category cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Reads and plain writes over the `expenses` table, scoped by the session's user.
#[derive(Debug, Clone)]
pub struct ExpenseStore {
    db: DatabaseConnection,
}

impl ExpenseStore {
    /// Creates a store over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records an expense that does not touch the wallet.
    ///
    /// Wallet-linked expenses must be recorded through the ledger so the deduction
    /// happens in the same transaction.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &Session, new: &NewExpense) -> Result<expense::Model> {
        let draft = new.validate()?;
        if draft.deduct_from_wallet {
            return Err(Error::validation(
                "Wallet-linked expenses must be recorded through the ledger",
            ));
        }

        let created = insert(&self.db, &session.user_id, draft).await?;
        info!(expense_id = created.id, "Recorded expense");
        Ok(created)
    }

    /// Finds one of the user's expenses by id.
    pub async fn get(&self, session: &Session, expense_id: i64) -> Result<Option<expense::Model>> {
        find_owned(&self.db, expense_id, &session.user_id).await
    }

    /// Like [`Self::get`] but a missing expense is an error.
    pub async fn require(&self, session: &Session, expense_id: i64) -> Result<expense::Model> {
        self.get(session, expense_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))
    }

    /// Lists the user's expenses, newest date first, optionally capped at `limit` rows.
    pub async fn list(&self, session: &Session, limit: Option<u64>) -> Result<Vec<expense::Model>> {
        let mut query = Expense::find()
            .filter(expense::Column::UserId.eq(session.user_id.as_str()))
            .order_by_desc(expense::Column::Date)
            .order_by_desc(expense::Column::Id);

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query.all(&self.db).await.map_err(Into::into)
    }

    /// Lists the user's expenses dated within `start..=end`, newest date first.
    pub async fn list_in_range(
        &self,
        session: &Session,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<expense::Model>> {
        if start > end {
            return Err(Error::validation(format!(
                "Range start {start} is after range end {end}"
            )));
        }

        Expense::find()
            .filter(expense::Column::UserId.eq(session.user_id.as_str()))
            .filter(expense::Column::Date.between(start, end))
            .order_by_desc(expense::Column::Date)
            .order_by_desc(expense::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Applies a patch that leaves the wallet alone.
    ///
    /// Changing the amount or the wallet flag of an expense that is (or would become)
    /// wallet-linked is rejected; use the ledger for that.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn update(
        &self,
        session: &Session,
        expense_id: i64,
        patch: &ExpensePatch,
    ) -> Result<expense::Model> {
        let draft = patch.validate()?;
        let existing = self.require(session, expense_id).await?;

        let wallet_involved =
            existing.deduct_from_wallet || patch.deduct_from_wallet == Some(true);
        if wallet_involved && patch.touches_wallet() {
            return Err(Error::validation(
                "Wallet-linked changes must be applied through the ledger",
            ));
        }

        apply_patch(&self.db, existing, draft).await
    }

    /// Deletes an expense that is not wallet-linked.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn delete(&self, session: &Session, expense_id: i64) -> Result<()> {
        let existing = self.require(session, expense_id).await?;
        if existing.deduct_from_wallet {
            return Err(Error::validation(
                "Wallet-linked expenses must be deleted through the ledger",
            ));
        }

        existing.delete(&self.db).await?;
        info!(expense_id, "Deleted expense");
        Ok(())
    }

    /// Number of the user's expenses filed under `category`.
    pub async fn count_by_category(&self, session: &Session, category: &str) -> Result<u64> {
        count_with_category(&self.db, &session.user_id, category).await
    }
}

/// Finds an expense by id, returning None if it does not exist or belongs to another user.
pub(crate) async fn find_owned<C>(
    db: &C,
    expense_id: i64,
    user_id: &str,
) -> Result<Option<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find_by_id(expense_id)
        .filter(expense::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Inserts a validated expense owned by `user_id`, stamping both timestamps.
pub(crate) async fn insert<C>(db: &C, user_id: &str, draft: ExpenseDraft) -> Result<expense::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let model = expense::ActiveModel {
        user_id: Set(user_id.to_string()),
        amount_cents: Set(draft.amount_cents),
        date: Set(draft.date),
        category: Set(draft.category),
        location: Set(draft.location),
        description: Set(draft.description),
        deduct_from_wallet: Set(draft.deduct_from_wallet),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    model.insert(db).await.map_err(Into::into)
}

/// Writes the fields present in `draft` onto `existing` and bumps `updated_at`.
pub(crate) async fn apply_patch<C>(
    db: &C,
    existing: expense::Model,
    draft: PatchDraft,
) -> Result<expense::Model>
where
    C: ConnectionTrait,
{
    let expense_id = existing.id;
    let mut active: expense::ActiveModel = existing.into();

    if let Some(amount_cents) = draft.amount_cents {
        active.amount_cents = Set(amount_cents);
    }
    if let Some(date) = draft.date {
        active.date = Set(date);
    }
    if let Some(category) = draft.category {
        active.category = Set(category);
    }
    if let Some(location) = draft.location {
        active.location = Set(location);
    }
    if let Some(description) = draft.description {
        active.description = Set(description);
    }
    if let Some(flag) = draft.deduct_from_wallet {
        active.deduct_from_wallet = Set(flag);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(db).await?;
    debug!(expense_id, "Applied expense patch");
    Ok(updated)
}

/// Counts a user's expenses whose category name equals `category`.
pub(crate) async fn count_with_category<C>(db: &C, user_id: &str, category: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::UserId.eq(user_id))
        .filter(expense::Column::Category.eq(category))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Moves a user's expenses from category `from` to category `to`, returning how many changed.
pub(crate) async fn rename_category<C>(db: &C, user_id: &str, from: &str, to: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Expense::update_many()
        .col_expr(expense::Column::Category, Expr::value(to.to_string()))
        .col_expr(expense::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(expense::Column::UserId.eq(user_id))
        .filter(expense::Column::Category.eq(from))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_patch_json_distinguishes_null_from_absent() {
        let clear: ExpensePatch =
            serde_json::from_str(r#"{"location": null, "description": "Dinner"}"#).unwrap();
        assert_eq!(clear.location, Some(None));
        assert_eq!(clear.description, Some(Some("Dinner".to_string())));

        let untouched: ExpensePatch = serde_json::from_str(r#"{"amount": "12.50"}"#).unwrap();
        assert_eq!(untouched.location, None);
        assert_eq!(untouched.description, None);
        assert_eq!(untouched.amount, Some(dec!(12.50)));

        let round_trip: ExpensePatch =
            serde_json::from_str(&serde_json::to_string(&clear).unwrap()).unwrap();
        assert_eq!(round_trip, clear);
        let round_trip: ExpensePatch =
            serde_json::from_str(&serde_json::to_string(&untouched).unwrap()).unwrap();
        assert_eq!(round_trip, untouched);
    }

    #[tokio::test]
    async fn test_create_expense_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let store = ExpenseStore::new(db);
        let session = test_session("user1");

        // Zero amount
        let result = store
            .create(&session, &NewExpense::new(dec!(0), date(2024, 3, 1), "Food"))
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        // Negative amount
        let result = store
            .create(&session, &NewExpense::new(dec!(-3), date(2024, 3, 1), "Food"))
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        // Blank category
        let result = store
            .create(&session, &NewExpense::new(dec!(10), date(2024, 3, 1), "   "))
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Wallet-linked payloads belong to the ledger
        let result = store
            .create(
                &session,
                &NewExpense::new(dec!(10), date(2024, 3, 1), "Food").deducted(true),
            )
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_expense_integration() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        let mut new = NewExpense::new(dec!(42.50), date(2024, 3, 14), "  Food & Dining ");
        new.location = Some("Canteen".to_string());
        new.description = Some("   ".to_string());

        let created = store.create(&session, &new).await?;
        assert_eq!(created.user_id, session.user_id);
        assert_eq!(created.amount(), dec!(42.50));
        assert_eq!(created.amount_cents, 4250);
        assert_eq!(created.category, "Food & Dining");
        assert_eq!(created.location.as_deref(), Some("Canteen"));
        assert_eq!(created.description, None);
        assert!(!created.deduct_from_wallet);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.require(&session, created.id).await?;
        assert_eq!(fetched, created);

        Ok(())
    }

    #[tokio::test]
    async fn test_expenses_are_scoped_by_user() -> Result<()> {
        let db = setup_test_db().await?;
        let store = ExpenseStore::new(db);
        let alice = test_session("alice");
        let bob = test_session("bob");

        let created = store
            .create(&alice, &NewExpense::new(dec!(5), date(2024, 1, 2), "Food"))
            .await?;

        assert!(store.get(&bob, created.id).await?.is_none());
        assert!(matches!(
            store.require(&bob, created.id).await,
            Err(Error::NotFound { entity: "expense", .. })
        ));
        assert!(store.list(&bob, None).await?.is_empty());
        assert!(matches!(
            store.delete(&bob, created.id).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(store.list(&alice, None).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_by_date_desc_and_limits() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        let older = store
            .create(&session, &NewExpense::new(dec!(1), date(2024, 1, 5), "Food"))
            .await?;
        let newest = store
            .create(&session, &NewExpense::new(dec!(2), date(2024, 2, 5), "Food"))
            .await?;
        let middle = store
            .create(&session, &NewExpense::new(dec!(3), date(2024, 1, 20), "Travel"))
            .await?;

        let all = store.list(&session, None).await?;
        let ids: Vec<i64> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, older.id]);

        let limited = store.list(&session, Some(2)).await?;
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, newest.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_in_range_is_inclusive() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        for day in [1, 15, 31] {
            store
                .create(&session, &NewExpense::new(dec!(10), date(2024, 1, day), "Food"))
                .await?;
        }
        store
            .create(&session, &NewExpense::new(dec!(10), date(2024, 2, 1), "Food"))
            .await?;

        let january = store
            .list_in_range(&session, date(2024, 1, 1), date(2024, 1, 31))
            .await?;
        assert_eq!(january.len(), 3);

        let result = store
            .list_in_range(&session, date(2024, 2, 1), date(2024, 1, 1))
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_plain_fields() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        let mut new = NewExpense::new(dec!(20), date(2024, 5, 1), "Food");
        new.location = Some("Market".to_string());
        let created = store.create(&session, &new).await?;

        let patch = ExpensePatch {
            amount: Some(dec!(25.75)),
            category: Some("Groceries".to_string()),
            location: Some(None),
            description: Some(Some("weekly shop".to_string())),
            ..Default::default()
        };
        let updated = store.update(&session, created.id, &patch).await?;

        assert_eq!(updated.amount(), dec!(25.75));
        assert_eq!(updated.category, "Groceries");
        assert_eq!(updated.location, None);
        assert_eq!(updated.description.as_deref(), Some("weekly shop"));
        assert_eq!(updated.date, created.date);
        assert!(updated.updated_at >= created.updated_at);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_turning_on_wallet_deduction() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        let created = store
            .create(&session, &NewExpense::new(dec!(20), date(2024, 5, 1), "Food"))
            .await?;

        let patch = ExpensePatch {
            deduct_from_wallet: Some(true),
            ..Default::default()
        };
        let result = store.update(&session, created.id, &patch).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Nothing changed
        let unchanged = store.require(&session, created.id).await?;
        assert!(!unchanged.deduct_from_wallet);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_plain_expense() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        let created = store
            .create(&session, &NewExpense::new(dec!(20), date(2024, 5, 1), "Food"))
            .await?;
        store.delete(&session, created.id).await?;

        assert!(store.get(&session, created.id).await?.is_none());
        assert!(matches!(
            store.delete(&session, created.id).await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_count_by_category() -> Result<()> {
        let (db, session) = setup_with_session().await?;
        let store = ExpenseStore::new(db);

        store
            .create(&session, &NewExpense::new(dec!(1), date(2024, 1, 1), "Food"))
            .await?;
        store
            .create(&session, &NewExpense::new(dec!(2), date(2024, 1, 2), "Food"))
            .await?;
        store
            .create(&session, &NewExpense::new(dec!(3), date(2024, 1, 3), "Travel"))
            .await?;

        assert_eq!(store.count_by_category(&session, "Food").await?, 2);
        assert_eq!(store.count_by_category(&session, "Travel").await?, 1);
        assert_eq!(store.count_by_category(&session, "Fitness").await?, 0);

        Ok(())
    }
}

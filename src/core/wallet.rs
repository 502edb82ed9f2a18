//! Wallet business logic - The per-user cash balance.
//!
//! Provides lazy creation, direct top-ups and balance edits, and the connection-generic
//! helpers the ledger uses to move the balance inside its transactions.

use crate::{
    auth::Session,
    core::money,
    entities::{Wallet, wallet},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

/// Access to the session user's wallet.
#[derive(Debug, Clone)]
pub struct WalletStore {
    db: DatabaseConnection,
}

impl WalletStore {
    /// Creates a store over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the user's wallet if one has been created.
    pub async fn get(&self, session: &Session) -> Result<Option<wallet::Model>> {
        find_for_user(&self.db, &session.user_id).await
    }

    /// Returns the user's wallet, creating it with a zero balance on first access.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn get_or_create(&self, session: &Session) -> Result<wallet::Model> {
        if let Some(existing) = self.get(session).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = wallet::ActiveModel {
            user_id: Set(session.user_id.clone()),
            balance_cents: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(created) => {
                info!(wallet_id = created.id, "Created wallet");
                Ok(created)
            }
            // Another caller may have created it between our read and insert;
            // the unique user_id column rejects the duplicate.
            Err(err) => {
                warn!(error = %err, "Wallet insert failed, re-reading");
                self.get(session)
                    .await?
                    .ok_or_else(|| Error::from(err))
            }
        }
    }

    /// Adds `amount` to the balance.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn add_funds(&self, session: &Session, amount: Decimal) -> Result<wallet::Model> {
        let delta = money::positive_minor_units(amount)?;
        let wallet = self.get_or_create(session).await?;

        let updated = adjust_balance_atomic(&self.db, wallet.id, delta).await?;
        info!(wallet_id = updated.id, balance = %updated.balance(), "Added funds");
        Ok(updated)
    }

    /// Overwrites the balance with `amount`, which may not be negative.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn set_balance(&self, session: &Session, amount: Decimal) -> Result<wallet::Model> {
        let balance_cents = money::to_minor_units(amount)?;
        if balance_cents < 0 {
            return Err(Error::InvalidAmount { amount });
        }

        let wallet = self.get_or_create(session).await?;
        let updated = write_balance(&self.db, wallet, balance_cents).await?;
        info!(wallet_id = updated.id, balance = %updated.balance(), "Set wallet balance");
        Ok(updated)
    }

    /// Takes `amount` out of the wallet, failing if the balance cannot cover it.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn deduct(&self, session: &Session, amount: Decimal) -> Result<wallet::Model> {
        let deduction = money::positive_minor_units(amount)?;
        let wallet_id = self.get_or_create(session).await?.id;

        let txn = self.db.begin().await?;

        let wallet = find_owned(&txn, wallet_id, &session.user_id).await?;
        if wallet.balance_cents < deduction {
            return Err(Error::InsufficientFunds {
                current: wallet.balance(),
                required: money::from_minor_units(deduction),
            });
        }

        let new_balance = wallet.balance_cents - deduction;
        let updated = write_balance(&txn, wallet, new_balance).await?;

        txn.commit().await?;
        info!(wallet_id, balance = %updated.balance(), "Deducted from wallet");
        Ok(updated)
    }

    /// Whether the wallet currently holds at least `amount`. False when no wallet exists.
    pub async fn can_afford(&self, session: &Session, amount: Decimal) -> Result<bool> {
        let needed = money::to_minor_units(amount)?;
        Ok(self
            .get(session)
            .await?
            .is_some_and(|wallet| wallet.balance_cents >= needed))
    }
}

/// Finds the wallet belonging to `user_id`.
pub(crate) async fn find_for_user<C>(db: &C, user_id: &str) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a wallet by id, treating another user's wallet as missing.
pub(crate) async fn find_owned<C>(db: &C, wallet_id: i64, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(wallet_id)
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet", wallet_id))
}

/// Writes an absolute balance onto a wallet that was read in the same transaction.
pub(crate) async fn write_balance<C>(
    db: &C,
    wallet: wallet::Model,
    balance_cents: i64,
) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let mut active: wallet::ActiveModel = wallet.into();
    active.balance_cents = Set(balance_cents);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Adds `delta_cents` to a wallet balance with a single
/// `UPDATE wallets SET balance_cents = balance_cents + ?` statement.
///
/// # Returns
/// The updated wallet model
pub(crate) async fn adjust_balance_atomic<C>(
    db: &C,
    wallet_id: i64,
    delta_cents: i64,
) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let result = Wallet::update_many()
        .col_expr(
            wallet::Column::BalanceCents,
            Expr::col(wallet::Column::BalanceCents).add(delta_cents),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::Id.eq(wallet_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("wallet", wallet_id));
    }

    Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet", wallet_id))
}

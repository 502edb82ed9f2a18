//! Wallet-linked expense ledger.
//!
//! Keeps an expense record and the owner's wallet balance consistent across create, update
//! and delete. Each primitive runs inside one database transaction: the wallet is read,
//! the precondition is checked, then the expense write and the balance write are committed
//! together. Any early return drops the uncommitted transaction, which rolls it back, so a
//! failed call leaves both the expense and the wallet exactly as they were.
//!
//! The invariant maintained is: for every expense with `deduct_from_wallet = true`, the
//! wallet reflects exactly one deduction of that expense's current amount.

use crate::{
    auth::Session,
    core::{
        expense::{self, ExpensePatch, ExpenseStore, NewExpense},
        money,
        wallet::{self, WalletStore},
    },
    entities::expense as expense_entity,
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, ModelTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// The wallet state before and after an expense update.
///
/// Callers resolve missing fields against the stored expense before building this. The
/// ledger checks both sides against the row it reads inside its transaction and refuses
/// an adjustment that does not describe that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAdjustment {
    /// Whether the expense was deducted before the update
    pub previous_deduction: bool,
    /// Expense amount before the update
    pub previous_amount: Decimal,
    /// Whether the expense is deducted after the update
    pub new_deduction: bool,
    /// Expense amount after the update
    pub new_amount: Decimal,
}

impl WalletAdjustment {
    /// Net change to the wallet balance in minor units: the old deduction is refunded and
    /// the new one charged.
    pub fn delta_cents(&self) -> Result<i64> {
        let refunded = if self.previous_deduction {
            money::to_minor_units(self.previous_amount)?
        } else {
            0
        };
        let charged = if self.new_deduction {
            money::to_minor_units(self.new_amount)?
        } else {
            0
        };
        refunded
            .checked_sub(charged)
            .ok_or_else(|| Error::validation("Wallet adjustment out of range"))
    }

    /// The transition `patch` would make on `existing`. Fields missing from the patch
    /// keep their stored values.
    #[must_use]
    pub fn resolve(existing: &expense_entity::Model, patch: &ExpensePatch) -> Self {
        Self {
            previous_deduction: existing.deduct_from_wallet,
            previous_amount: existing.amount(),
            new_deduction: patch
                .deduct_from_wallet
                .unwrap_or(existing.deduct_from_wallet),
            new_amount: patch.amount.unwrap_or_else(|| existing.amount()),
        }
    }

    /// Whether the wallet is deducted before or after the transition.
    #[must_use]
    pub const fn involves_wallet(&self) -> bool {
        self.previous_deduction || self.new_deduction
    }

    /// Fails unless the `previous_*` side matches the stored expense and a new deduction
    /// matches the amount the expense will hold after the patch.
    fn check_against(
        &self,
        existing: &expense_entity::Model,
        patched_amount_cents: Option<i64>,
    ) -> Result<()> {
        let previous_cents = money::to_minor_units(self.previous_amount)?;
        if existing.deduct_from_wallet != self.previous_deduction
            || (self.previous_deduction && existing.amount_cents != previous_cents)
        {
            return Err(Error::validation(format!(
                "Expense {} changed since it was read; reload and retry",
                existing.id
            )));
        }

        let stored_after = patched_amount_cents.unwrap_or(existing.amount_cents);
        if self.new_deduction && money::to_minor_units(self.new_amount)? != stored_after {
            return Err(Error::validation(format!(
                "New deduction {} does not match the amount of expense {}",
                self.new_amount, existing.id
            )));
        }
        Ok(())
    }
}

/// Coordinates expense writes with the wallet balance.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: DatabaseConnection,
    expenses: ExpenseStore,
    wallets: WalletStore,
}

impl Ledger {
    /// Creates a ledger over `db`.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            expenses: ExpenseStore::new(db.clone()),
            wallets: WalletStore::new(db.clone()),
            db,
        }
    }

    /// Records an expense and deducts `deduction` from the wallet in one transaction.
    ///
    /// Fails with [`Error::InsufficientFunds`] when the balance is lower than the
    /// deduction; in that case no expense is created.
    #[instrument(skip(self, session, new), fields(user_id = %session.user_id))]
    pub async fn create_with_deduction(
        &self,
        session: &Session,
        new: &NewExpense,
        wallet_id: i64,
        deduction: Decimal,
    ) -> Result<expense_entity::Model> {
        let mut draft = new.validate()?;
        let deduction_cents = money::positive_minor_units(deduction)?;
        if deduction_cents != draft.amount_cents {
            return Err(Error::validation(format!(
                "Deduction {deduction} does not match expense amount {}",
                new.amount
            )));
        }
        draft.deduct_from_wallet = true;

        let txn = self.db.begin().await?;

        let wallet = wallet::find_owned(&txn, wallet_id, &session.user_id).await?;
        if wallet.balance_cents < deduction_cents {
            return Err(Error::InsufficientFunds {
                current: wallet.balance(),
                required: money::from_minor_units(deduction_cents),
            });
        }

        let created = expense::insert(&txn, &session.user_id, draft).await?;
        let new_balance = wallet.balance_cents - deduction_cents;
        let wallet = wallet::write_balance(&txn, wallet, new_balance).await?;

        txn.commit().await?;

        info!(
            expense_id = created.id,
            wallet_id,
            balance = %wallet.balance(),
            "Recorded expense with wallet deduction"
        );
        Ok(created)
    }

    /// Applies `patch` to an expense and moves the wallet by the difference between the
    /// previous and the new deduction, all in one transaction.
    ///
    /// `adjustment.previous_*` must describe the expense as currently stored and a new
    /// deduction must equal the amount the expense holds after the patch. A stale view
    /// fails with [`Error::Validation`] and changes nothing. The stored wallet flag is
    /// set to `adjustment.new_deduction`. Returns the updated expense as written.
    #[instrument(skip(self, session, patch), fields(user_id = %session.user_id))]
    pub async fn update_with_adjustment(
        &self,
        session: &Session,
        expense_id: i64,
        patch: &ExpensePatch,
        wallet_id: i64,
        adjustment: WalletAdjustment,
    ) -> Result<expense_entity::Model> {
        let new_amount_cents = money::to_minor_units(adjustment.new_amount)?;
        if patch
            .validate()?
            .amount_cents
            .is_some_and(|amount_cents| amount_cents != new_amount_cents)
        {
            return Err(Error::validation(
                "Patched amount does not match the adjustment's new amount",
            ));
        }

        self.apply_adjusted(session, expense_id, patch, wallet_id, Some(adjustment))
            .await
    }

    /// Runs an adjusted update in one transaction. With `expected` set, the adjustment
    /// must match the stored row; without it, the adjustment is resolved from the row
    /// read inside the transaction.
    async fn apply_adjusted(
        &self,
        session: &Session,
        expense_id: i64,
        patch: &ExpensePatch,
        wallet_id: i64,
        expected: Option<WalletAdjustment>,
    ) -> Result<expense_entity::Model> {
        let mut draft = patch.validate()?;

        let txn = self.db.begin().await?;

        let wallet = wallet::find_owned(&txn, wallet_id, &session.user_id).await?;
        let existing = expense::find_owned(&txn, expense_id, &session.user_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;

        let adjustment = match expected {
            Some(adjustment) => {
                adjustment.check_against(&existing, draft.amount_cents)?;
                adjustment
            }
            None => WalletAdjustment::resolve(&existing, patch),
        };
        draft.deduct_from_wallet = Some(adjustment.new_deduction);
        let delta = adjustment.delta_cents()?;

        let new_balance = wallet
            .balance_cents
            .checked_add(delta)
            .ok_or_else(|| Error::validation("Wallet balance out of range"))?;
        if adjustment.new_deduction && new_balance < 0 {
            return Err(Error::InsufficientFunds {
                current: wallet.balance(),
                required: money::from_minor_units(-delta),
            });
        }

        let updated = expense::apply_patch(&txn, existing, draft).await?;
        if delta != 0 {
            wallet::write_balance(&txn, wallet, new_balance).await?;
        }

        txn.commit().await?;

        info!(
            expense_id,
            wallet_id,
            delta = %money::from_minor_units(delta),
            "Updated expense with wallet adjustment"
        );
        Ok(updated)
    }

    /// Deletes an expense and credits `refund` back to the wallet in one transaction.
    ///
    /// The expense must be stored as deducted with exactly `refund` as its amount.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn delete_with_refund(
        &self,
        session: &Session,
        expense_id: i64,
        wallet_id: i64,
        refund: Decimal,
    ) -> Result<()> {
        let refund_cents = money::positive_minor_units(refund)?;

        let txn = self.db.begin().await?;

        let existing = expense::find_owned(&txn, expense_id, &session.user_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;
        if !existing.deduct_from_wallet || existing.amount_cents != refund_cents {
            return Err(Error::validation(format!(
                "Refund {refund} does not match the stored wallet deduction of expense {expense_id}"
            )));
        }
        wallet::find_owned(&txn, wallet_id, &session.user_id).await?;

        existing.delete(&txn).await?;
        let wallet = wallet::adjust_balance_atomic(&txn, wallet_id, refund_cents).await?;

        txn.commit().await?;

        info!(
            expense_id,
            wallet_id,
            balance = %wallet.balance(),
            "Deleted expense with wallet refund"
        );
        Ok(())
    }

    /// Records an expense, deducting it from the wallet when the payload asks for it.
    ///
    /// The wallet is created on first use.
    pub async fn record_expense(
        &self,
        session: &Session,
        new: &NewExpense,
    ) -> Result<expense_entity::Model> {
        if !new.deduct_from_wallet {
            return self.expenses.create(session, new).await;
        }

        let wallet = self.wallets.get_or_create(session).await?;
        self.create_with_deduction(session, new, wallet.id, new.amount)
            .await
    }

    /// Applies a patch, resolving the wallet transition from the stored expense.
    ///
    /// Fields missing from the patch keep their stored values. When neither the old nor
    /// the new state is wallet-linked the wallet is not read at all. Otherwise the
    /// transition is resolved from the row read inside the ledger transaction.
    pub async fn edit_expense(
        &self,
        session: &Session,
        expense_id: i64,
        patch: &ExpensePatch,
    ) -> Result<expense_entity::Model> {
        let existing = self.expenses.require(session, expense_id).await?;

        if !WalletAdjustment::resolve(&existing, patch).involves_wallet() {
            debug!(expense_id, "Edit does not involve the wallet");
            return self.expenses.update(session, expense_id, patch).await;
        }

        let wallet = self.wallets.get_or_create(session).await?;
        self.apply_adjusted(session, expense_id, patch, wallet.id, None)
            .await
    }

    /// Deletes an expense, refunding the wallet if the expense was deducted from it.
    pub async fn remove_expense(&self, session: &Session, expense_id: i64) -> Result<()> {
        let existing = self.expenses.require(session, expense_id).await?;

        if !existing.deduct_from_wallet {
            return self.expenses.delete(session, expense_id).await;
        }

        let wallet = self
            .wallets
            .get(session)
            .await?
            .ok_or_else(|| Error::not_found("wallet", &session.user_id))?;
        self.delete_with_refund(session, expense_id, wallet.id, existing.amount())
            .await
    }
}

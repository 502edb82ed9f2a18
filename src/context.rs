//! Application context.
//!
//! Built once at startup and handed to whatever front end drives the crate.

use crate::{
    auth::Session,
    config::settings::AppConfig,
    core::{
        analytics::{self, CategoryTotal, DailyTotal, DashboardSummary, MonthlyTotal},
        category::CategoryStore,
        expense::ExpenseStore,
        ledger::Ledger,
        money,
        wallet::WalletStore,
    },
    entities::expense,
    errors::Result,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::instrument;

/// Shared handles to every store.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Settings the context was built with
    pub config: AppConfig,
    /// Underlying connection
    pub database: DatabaseConnection,
    /// Plain expense reads and writes
    pub expenses: ExpenseStore,
    /// Wallet balance
    pub wallets: WalletStore,
    /// Categories
    pub categories: CategoryStore,
    /// Atomic expense and wallet operations
    pub ledger: Ledger,
}

/// Everything the dashboard page shows for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    /// Headline totals
    pub summary: DashboardSummary,
    /// Wallet balance, zero when no wallet exists yet
    pub wallet_balance: Decimal,
    /// Most recent expenses
    pub recent: Vec<expense::Model>,
    /// This month's spending per category, largest first
    pub categories_this_month: Vec<CategoryTotal>,
    /// Monthly totals over the configured trend window
    pub trend: Vec<MonthlyTotal>,
    /// One total per day of the current month
    pub daily_this_month: Vec<DailyTotal>,
}

impl AppContext {
    /// Builds every store over `database`.
    #[must_use]
    pub fn new(config: AppConfig, database: DatabaseConnection) -> Self {
        Self {
            expenses: ExpenseStore::new(database.clone()),
            wallets: WalletStore::new(database.clone()),
            categories: CategoryStore::new(database.clone()),
            ledger: Ledger::new(database.clone()),
            config,
            database,
        }
    }

    /// Formats an amount with the configured currency symbol.
    #[must_use]
    pub fn format_amount(&self, amount: Decimal) -> String {
        money::format_amount(amount, &self.config.currency_symbol)
    }

    /// Loads the user's expenses once and derives the dashboard from them.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn dashboard(&self, session: &Session, today: NaiveDate) -> Result<DashboardView> {
        let all = self.expenses.list(session, None).await?;
        let wallet_balance = self
            .wallets
            .get(session)
            .await?
            .map_or(Decimal::ZERO, |wallet| wallet.balance());

        let month_start = today.with_day(1);
        let categories_this_month =
            analytics::sort_by_amount(analytics::by_category(&all, month_start, Some(today)));

        Ok(DashboardView {
            summary: analytics::summarize(&all, today),
            wallet_balance,
            recent: analytics::recent(&all, self.config.dashboard.recent_limit)
                .into_iter()
                .cloned()
                .collect(),
            categories_this_month,
            trend: analytics::trend(&all, today, self.config.dashboard.trend_months),
            daily_this_month: analytics::daily_totals(&all, today.year(), today.month()),
        })
    }
}

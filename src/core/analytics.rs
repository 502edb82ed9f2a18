//! Expense analytics.
//!
//! Pure functions over an already-loaded, already-scoped slice of expenses. Nothing here
//! touches the database; callers fetch with [`crate::core::expense::ExpenseStore`] and
//! aggregate the result. All totals are accumulated in `i128` minor units, so no
//! collection of `i64` amounts can overflow them.

use crate::{core::money, entities::expense};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Spending under one category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    /// Category name as stored on the expenses
    pub category: String,
    /// Sum of amounts
    pub amount: Decimal,
    /// Number of expenses
    pub count: usize,
}

/// Spending in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    /// Year of the bucket
    pub year: i32,
    /// Month number, 1 = January
    pub month: u32,
    /// Short month name
    pub label: &'static str,
    /// Sum of amounts
    pub amount: Decimal,
    /// Number of expenses
    pub count: usize,
}

/// Spending on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    /// The day
    pub date: NaiveDate,
    /// Sum of amounts
    pub amount: Decimal,
    /// Number of expenses
    pub count: usize,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    /// Spent so far in the current month
    pub total_this_month: Decimal,
    /// Spent in the previous month
    pub total_prev_month: Decimal,
    /// Spent today
    pub total_today: Decimal,
    /// Spent across the whole collection
    pub total_all_time: Decimal,
    /// Change from last month to this month in percent, 0 when last month was empty
    pub monthly_change_percent: Decimal,
    /// Number of expenses in the collection
    pub expense_count: usize,
    /// This month's total divided by the day of the month
    pub average_daily: Decimal,
    /// All-time total divided by the number of months elapsed this year
    pub monthly_average: Decimal,
}

#[derive(Default)]
struct Bucket {
    cents: i128,
    count: usize,
}

impl Bucket {
    fn add(&mut self, expense: &expense::Model) {
        self.cents += i128::from(expense.amount_cents);
        self.count += 1;
    }
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

fn sum_cents<'a>(expenses: impl IntoIterator<Item = &'a expense::Model>) -> i128 {
    expenses
        .into_iter()
        .map(|e| i128::from(e.amount_cents))
        .sum()
}

/// Totals per category name, optionally restricted to `start..=end`.
///
/// Only categories that actually occur are returned, in order of first appearance.
#[must_use]
pub fn by_category(
    expenses: &[expense::Model],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<CategoryTotal> {
    let mut order: Vec<&str> = Vec::new();
    let mut buckets: HashMap<&str, Bucket> = HashMap::new();

    for expense in expenses.iter().filter(|e| in_range(e.date, start, end)) {
        let key = expense.category.as_str();
        buckets
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Bucket::default()
            })
            .add(expense);
    }

    order
        .into_iter()
        .filter_map(|name| {
            buckets.remove(name).map(|bucket| CategoryTotal {
                category: name.to_string(),
                amount: money::from_minor_units_sum(bucket.cents),
                count: bucket.count,
            })
        })
        .collect()
}

/// Sorts category totals by amount, largest first. Ties keep their order.
#[must_use]
pub fn sort_by_amount(mut totals: Vec<CategoryTotal>) -> Vec<CategoryTotal> {
    totals.sort_by(|a, b| b.amount.cmp(&a.amount));
    totals
}

/// Twelve monthly totals for `year`, January first. Empty months are present with zero.
#[must_use]
pub fn by_month(expenses: &[expense::Model], year: i32) -> Vec<MonthlyTotal> {
    let mut buckets: [Bucket; 12] = Default::default();

    for expense in expenses.iter().filter(|e| e.date.year() == year) {
        buckets[expense.date.month0() as usize].add(expense);
    }

    buckets
        .iter()
        .zip(1..)
        .map(|(bucket, month)| MonthlyTotal {
            year,
            month,
            label: MONTH_LABELS[month as usize - 1],
            amount: money::from_minor_units_sum(bucket.cents),
            count: bucket.count,
        })
        .collect()
}

/// The last `months` calendar months up to and including the month of `today`,
/// oldest first, zero-filled.
#[must_use]
pub fn trend(expenses: &[expense::Model], today: NaiveDate, months: u32) -> Vec<MonthlyTotal> {
    let Some(current) = today.with_day(1) else {
        return Vec::new();
    };

    (0..months)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .map(|first_day| {
            let mut bucket = Bucket::default();
            for expense in expenses.iter().filter(|e| same_month(e.date, first_day)) {
                bucket.add(expense);
            }
            MonthlyTotal {
                year: first_day.year(),
                month: first_day.month(),
                label: MONTH_LABELS[first_day.month0() as usize],
                amount: money::from_minor_units_sum(bucket.cents),
                count: bucket.count,
            }
        })
        .collect()
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Sum of every expense in the collection.
#[must_use]
pub fn total_of(expenses: &[expense::Model]) -> Decimal {
    money::from_minor_units_sum(sum_cents(expenses))
}

/// Expenses dated exactly `date`, in their original order.
#[must_use]
pub fn on_date(expenses: &[expense::Model], date: NaiveDate) -> Vec<&expense::Model> {
    expenses.iter().filter(|e| e.date == date).collect()
}

/// Sum of the expenses dated exactly `date`.
#[must_use]
pub fn total_on_date(expenses: &[expense::Model], date: NaiveDate) -> Decimal {
    money::from_minor_units_sum(sum_cents(expenses.iter().filter(|e| e.date == date)))
}

/// One total per day of `month` in `year`, first day first. Days without expenses are
/// present with zero. An invalid month yields nothing.
#[must_use]
pub fn daily_totals(expenses: &[expense::Model], year: i32, month: u32) -> Vec<DailyTotal> {
    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut buckets: [Bucket; 31] = Default::default();
    for expense in expenses.iter().filter(|e| same_month(e.date, first_day)) {
        buckets[expense.date.day0() as usize].add(expense);
    }

    first_day
        .iter_days()
        .take_while(|day| day.month() == month)
        .zip(buckets.iter())
        .map(|(date, bucket)| DailyTotal {
            date,
            amount: money::from_minor_units_sum(bucket.cents),
            count: bucket.count,
        })
        .collect()
}

/// The `n` most recent expenses by date. Expenses sharing a date keep their
/// original relative order.
#[must_use]
pub fn recent(expenses: &[expense::Model], n: usize) -> Vec<&expense::Model> {
    let mut sorted: Vec<&expense::Model> = expenses.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.truncate(n);
    sorted
}

/// Computes the dashboard headline numbers as of `today`.
#[must_use]
pub fn summarize(expenses: &[expense::Model], today: NaiveDate) -> DashboardSummary {
    let this_month = sum_cents(expenses.iter().filter(|e| same_month(e.date, today)));
    let prev_month = today
        .checked_sub_months(Months::new(1))
        .map_or(0, |prev| {
            sum_cents(expenses.iter().filter(|e| same_month(e.date, prev)))
        });
    let today_total = sum_cents(expenses.iter().filter(|e| e.date == today));
    let all_time = sum_cents(expenses);

    let monthly_change_percent = if prev_month > 0 {
        let this = money::from_minor_units_sum(this_month);
        let prev = money::from_minor_units_sum(prev_month);
        this.checked_sub(prev)
            .and_then(|change| change.checked_mul(Decimal::ONE_HUNDRED))
            .and_then(|change| change.checked_div(prev))
            .map_or(Decimal::ZERO, |percent| {
                percent.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
            })
    } else {
        Decimal::ZERO
    };

    let per = |cents: i128, divisor: u32| {
        (money::from_minor_units_sum(cents) / Decimal::from(divisor.max(1)))
            .round_dp_with_strategy(money::SCALE, RoundingStrategy::MidpointAwayFromZero)
    };

    DashboardSummary {
        total_this_month: money::from_minor_units_sum(this_month),
        total_prev_month: money::from_minor_units_sum(prev_month),
        total_today: money::from_minor_units_sum(today_total),
        total_all_time: money::from_minor_units_sum(all_time),
        monthly_change_percent,
        expense_count: expenses.len(),
        average_daily: per(this_month, today.day()),
        monthly_average: per(all_time, today.month()),
    }
}

//! Unified error types for `HisabKitab`.
//!
//! Every store and ledger operation returns [`Result`]. Transport failures coming out of
//! `SeaORM` are normalised into the same taxonomy at the data-access boundary, so callers
//! only ever match on [`Error`].

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// All failures surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An expense, wallet, category or user does not exist (or belongs to someone else)
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier used for the lookup
        id: String,
    },

    /// The wallet cannot cover a deduction
    #[error("Insufficient funds: balance {current}, required {required}")]
    InsufficientFunds {
        /// Balance at the time of the check
        current: Decimal,
        /// Amount the operation needed
        required: Decimal,
    },

    /// A category cannot be deleted while expenses still reference it
    #[error("Category '{name}' is used by {expense_count} expense(s)")]
    CategoryInUse {
        /// Name of the category
        name: String,
        /// Number of expenses referencing it
        expense_count: u64,
    },

    /// No user is signed in
    #[error("No active user session")]
    Unauthenticated,

    /// The identity provider rejected the supplied credentials
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// Provider message
        message: String,
    },

    /// The operation is not allowed for the current user
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// What was refused
        message: String,
    },

    /// The backing store could not be reached
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Underlying transport message
        message: String,
    },

    /// Malformed input
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong
        message: String,
    },

    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Any other database error
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(e) => Self::BackendUnavailable {
                message: e.to_string(),
            },
            DbErr::Conn(e) => Self::BackendUnavailable {
                message: e.to_string(),
            },
            DbErr::RecordNotFound(id) => Self::NotFound {
                entity: "record",
                id,
            },
            other => Self::Database(other),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

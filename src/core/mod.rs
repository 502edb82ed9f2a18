//! Core business logic, independent of any front end.
//!
//! Every store operation takes the caller's [`crate::auth::Session`] and only ever sees
//! that user's rows.

/// Aggregations over loaded expenses
pub mod analytics;
/// Category listing, editing and the delete guard
pub mod category;
/// Plain expense CRUD and queries
pub mod expense;
/// Atomic expense and wallet operations
pub mod ledger;
/// Fixed-point money conversion and formatting
pub mod money;
/// The per-user wallet balance
pub mod wallet;

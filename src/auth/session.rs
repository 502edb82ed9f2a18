//! The signed-in user's session.
//!
//! A [`Session`] is issued by [`super::AuthAdapter`] and passed to every store call,
//! which uses `user_id` to scope reads and stamp ownership on writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The active user as seen by the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity-provider uid, also `users.id`
    pub user_id: String,
    /// Display name at sign-in time
    pub name: String,
    /// Email at sign-in time
    pub email: String,
    /// When the session was issued
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for `user_id` issued now.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
            signed_in_at: Utc::now(),
        }
    }

    /// First word of the display name, used for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

//! Shared test utilities for `HisabKitab`.
//!
//! This module provides helpers for setting up in-memory databases, sessions,
//! fixture rows and a scriptable identity provider.

use crate::{
    auth::{Credentials, Identity, IdentityProvider, Session},
    entities::expense,
    errors::{Error, Result},
};
use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all database tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A session for `user_id` with placeholder name and email.
pub fn test_session(user_id: &str) -> Session {
    Session::new(user_id, "Test User", format!("{user_id}@example.com"))
}

/// Sets up a database and a session for `test_user`.
pub async fn setup_with_session() -> Result<(DatabaseConnection, Session)> {
    let db = setup_test_db().await?;
    Ok((db, test_session("test_user")))
}

/// Shorthand for a calendar date. Panics on an invalid date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| {
        panic!("invalid test date {year}-{month}-{day}");
    })
}

/// An expense model that never touched a database, for the pure analytics functions.
///
/// # Defaults
/// * `user_id`: `"test_user"`
/// * no location or description, not wallet-linked
pub fn expense_model(
    id: i64,
    category: &str,
    amount_cents: i64,
    date: NaiveDate,
) -> expense::Model {
    let stamp = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
    expense::Model {
        id,
        user_id: "test_user".to_string(),
        amount_cents,
        date,
        category: category.to_string(),
        location: None,
        description: None,
        deduct_from_wallet: false,
        created_at: stamp,
        updated_at: stamp,
    }
}

#[derive(Debug, Clone)]
struct FakeAccount {
    uid: String,
    email: String,
    password: String,
    display_name: String,
}

impl FakeAccount {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// In-memory identity provider.
///
/// Email/password sign-in checks the registered password. Google sign-in accepts the
/// token `google-token-<uid>` for any registered uid. A provider built with
/// [`FakeIdentityProvider::offline`] fails every call with `BackendUnavailable`.
#[derive(Debug, Default)]
pub struct FakeIdentityProvider {
    accounts: Mutex<HashMap<String, FakeAccount>>,
    offline: bool,
}

impl FakeIdentityProvider {
    /// A provider whose every call fails as if the service were unreachable.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    /// Registers an account.
    pub fn register(&self, uid: &str, email: &str, password: &str, display_name: &str) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                uid.to_string(),
                FakeAccount {
                    uid: uid.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                    display_name: display_name.to_string(),
                },
            );
    }

    /// The display name the provider holds for `uid`.
    pub fn display_name(&self, uid: &str) -> Option<String> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uid)
            .map(|account| account.display_name.clone())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::BackendUnavailable {
                message: "identity service unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn lookup(&self, credentials: &Credentials) -> Result<Identity> {
        let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let found = match credentials {
            Credentials::EmailPassword { email, password } => accounts
                .values()
                .find(|a| &a.email == email && &a.password == password),
            Credentials::Google { id_token } => id_token
                .strip_prefix("google-token-")
                .and_then(|uid| accounts.get(uid)),
        };
        found
            .map(FakeAccount::identity)
            .ok_or_else(|| Error::InvalidCredentials {
                message: "Invalid email or password".to_string(),
            })
    }

    fn create(&self, email: &str, password: &str, name: &str) -> Result<Identity> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if accounts.values().any(|a| a.email == email) {
            return Err(Error::InvalidCredentials {
                message: "Email already in use".to_string(),
            });
        }
        let account = FakeAccount {
            uid: format!("uid-{}", accounts.len() + 1),
            email: email.to_string(),
            password: password.to_string(),
            display_name: name.to_string(),
        };
        let identity = account.identity();
        accounts.insert(account.uid.clone(), account);
        Ok(identity)
    }

    fn rename(&self, uid: &str, name: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get_mut(uid)
            .ok_or_else(|| Error::not_found("account", uid))?;
        account.display_name = name.to_string();
        Ok(())
    }
}

impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity> {
        self.check_online()?;
        self.lookup(credentials)
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Identity> {
        self.check_online()?;
        self.create(email, password, name)
    }

    async fn sign_out(&self, _uid: &str) -> Result<()> {
        self.check_online()
    }

    async fn update_display_name(&self, uid: &str, name: &str) -> Result<()> {
        self.check_online()?;
        self.rename(uid, name)
    }
}

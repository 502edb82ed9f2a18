//! Authentication.
//!
//! The remote identity service sits behind [`IdentityProvider`]. [`AuthAdapter`] drives it,
//! keeps the `users` table in step with the identities it returns, and holds the current
//! [`Session`] that every store call is scoped by.

mod session;

pub use session::Session;

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// What the identity service knows about a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id
    pub uid: String,
    /// Display name, possibly empty
    pub display_name: String,
    /// Email, possibly empty for federated sign-ins
    pub email: String,
}

/// Ways a user can prove who they are.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Email and password
    EmailPassword {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
    /// A Google ID token obtained by the client
    Google {
        /// Token to exchange with the identity service
        id_token: String,
    },
}

/// Profile fields a user may change. `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    /// New display name, must not be blank
    pub name: Option<String>,
    /// New phone number, an empty string clears it
    pub phone: Option<String>,
}

/// The remote identity service.
///
/// Implementations report bad credentials as [`Error::InvalidCredentials`] and
/// transport failures as [`Error::BackendUnavailable`].
pub trait IdentityProvider: Send + Sync {
    /// Verifies credentials and returns the identity they belong to.
    fn sign_in(&self, credentials: &Credentials) -> impl Future<Output = Result<Identity>> + Send;

    /// Registers a new email/password account.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> impl Future<Output = Result<Identity>> + Send;

    /// Ends the user's remote session.
    fn sign_out(&self, uid: &str) -> impl Future<Output = Result<()>> + Send;

    /// Changes the display name held by the identity service.
    fn update_display_name(&self, uid: &str, name: &str)
    -> impl Future<Output = Result<()>> + Send;
}

/// Signs users in and out and tracks the current session.
#[derive(Debug)]
pub struct AuthAdapter<P> {
    provider: P,
    db: DatabaseConnection,
    session: RwLock<Option<Session>>,
}

impl<P: IdentityProvider> AuthAdapter<P> {
    /// Creates an adapter with nobody signed in.
    pub fn new(provider: P, db: DatabaseConnection) -> Self {
        Self {
            provider,
            db,
            session: RwLock::new(None),
        }
    }

    /// Signs in with `credentials` and makes the resulting session current.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let identity = self.provider.sign_in(credentials).await?;
        self.establish(identity).await
    }

    /// Creates an email/password account and signs it in.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Name must not be empty"));
        }
        let identity = self.provider.sign_up(email.trim(), password, name).await?;
        self.establish(identity).await
    }

    /// Signs the current user out. Signing out with nobody signed in is a no-op.
    pub async fn sign_out(&self) -> Result<()> {
        let mut current = self.session.write().await;
        if let Some(session) = current.as_ref() {
            self.provider.sign_out(&session.user_id).await?;
            info!(user_id = %session.user_id, "Signed out");
        }
        *current = None;
        Ok(())
    }

    /// The signed-in user's session.
    ///
    /// # Errors
    /// Returns `Error::Unauthenticated` when nobody is signed in.
    pub async fn current_session(&self) -> Result<Session> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(Error::Unauthenticated)
    }

    /// The signed-in user's stored profile.
    pub async fn current_user(&self) -> Result<user::Model> {
        let session = self.current_session().await?;
        User::find_by_id(session.user_id.clone())
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found("user", session.user_id))
    }

    /// Updates the signed-in user's name and/or phone.
    ///
    /// A name change goes to the identity service first, then to the `users` row and the
    /// current session.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<user::Model> {
        let name = match patch.name.as_deref().map(str::trim) {
            Some("") => return Err(Error::validation("Name must not be empty")),
            other => other.map(str::to_string),
        };

        let existing = self.current_user().await?;

        if let Some(name) = name.as_deref() {
            self.provider
                .update_display_name(&existing.id, name)
                .await?;
        }

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = name.clone() {
            active.name = Set(name);
        }
        if let Some(phone) = patch.phone.as_deref().map(str::trim) {
            active.phone = Set((!phone.is_empty()).then(|| phone.to_string()));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        if let Some(name) = name {
            if let Some(session) = self.session.write().await.as_mut() {
                session.name = name;
            }
        }

        info!(user_id = %updated.id, "Updated profile");
        Ok(updated)
    }

    /// Upserts the user row for `identity` and makes it the current session.
    async fn establish(&self, identity: Identity) -> Result<Session> {
        let user = upsert_user(&self.db, &identity).await?;
        let session = Session::new(user.id, user.name, user.email);

        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }
}

/// Inserts or refreshes the `users` row for an identity. The phone number is kept.
async fn upsert_user(db: &DatabaseConnection, identity: &Identity) -> Result<user::Model> {
    let now = Utc::now();

    match User::find_by_id(identity.uid.clone()).one(db).await? {
        Some(existing) => {
            let mut active: user::ActiveModel = existing.into();
            if !identity.display_name.is_empty() {
                active.name = Set(identity.display_name.clone());
            }
            if !identity.email.is_empty() {
                active.email = Set(identity.email.clone());
            }
            active.updated_at = Set(now);
            active.update(db).await.map_err(Into::into)
        }
        None => {
            let model = user::ActiveModel {
                id: Set(identity.uid.clone()),
                name: Set(identity.display_name.clone()),
                email: Set(identity.email.clone()),
                phone: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model.insert(db).await.map_err(Into::into)
        }
    }
}

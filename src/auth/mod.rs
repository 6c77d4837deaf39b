//! Authentication collaborator and the auth screens built on it.

use async_trait::async_trait;
use axum::Router;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::StoreError;

mod dto;
pub(crate) mod extractors;
pub mod handlers;
mod jwt;
mod local;
mod password;

pub use extractors::AuthUser;
pub use local::{LocalAuth, LogResetSink, PasswordResetSink};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::account_routes())
}

/// Coded failures from the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The email address is badly formatted.")]
    InvalidEmail,

    #[error("Password should be at least 6 characters.")]
    WeakPassword,

    #[error("The email address is already in use by another account.")]
    EmailInUse,

    #[error("There is no user record corresponding to this identifier.")]
    UserNotFound,

    #[error("The password is invalid.")]
    WrongPassword,

    #[error("The supplied auth credential is incorrect, malformed or has expired.")]
    InvalidCredential,

    #[error("The session has expired. Please sign in again.")]
    InvalidToken,

    #[error("The password reset code is invalid or has expired.")]
    ResetCodeInvalid,

    #[error("auth backend error: {0}")]
    Backend(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::EmailInUse => "auth/email-already-in-use",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::InvalidToken => "auth/invalid-token",
            Self::ResetCodeInvalid => "auth/invalid-action-code",
            Self::Backend(_) => "auth/internal-error",
        }
    }

    /// Message shown to the user: friendly text for the common codes,
    /// otherwise the provider's own message.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserNotFound => "No account found for that email.".into(),
            Self::WrongPassword => "Incorrect password.".into(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// The signed-in account behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthIdentity {
    pub uid: Uuid,
    pub email: String,
}

impl AuthIdentity {
    /// Key of the profile document, `users/{uid}`.
    pub fn doc_id(&self) -> String {
        self.uid.to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: AuthIdentity,
    pub access_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Invalidates every token issued to this account so far.
    async fn sign_out(&self, user: &AuthIdentity) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    async fn reauthenticate(&self, user: &AuthIdentity, password: &str) -> Result<(), AuthError>;

    /// Returns a fresh session; older tokens stop verifying.
    async fn change_password(
        &self,
        user: &AuthIdentity,
        new_password: &str,
    ) -> Result<AuthSession, AuthError>;

    async fn delete_user(&self, user: &AuthIdentity) -> Result<(), AuthError>;

    async fn verify_token(&self, access_token: &str) -> Result<AuthIdentity, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_messages_for_common_codes() {
        assert_eq!(
            AuthError::UserNotFound.user_message(),
            "No account found for that email."
        );
        assert_eq!(AuthError::WrongPassword.user_message(), "Incorrect password.");
        assert_eq!(
            AuthError::EmailInUse.user_message(),
            "The email address is already in use by another account."
        );
        assert_eq!(AuthError::WrongPassword.code(), "auth/wrong-password");
    }
}

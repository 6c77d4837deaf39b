//! Email + password accounts kept in the document store.
//!
//! Each account lives at `accounts/{email}`. Tokens carry the account's
//! session epoch; signing out, changing or resetting the password bumps the
//! epoch so every token issued before stops verifying.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{Claims, JwtKeys, TokenKind};
use super::password::{check_strength, hash_secret, is_valid_email, normalize_email, verify_secret};
use super::{AuthError, AuthIdentity, AuthProvider, AuthSession};
use crate::config::JwtConfig;
use crate::store::{DocRef, DocumentStore, StoreError};
use crate::util::{fields, to_fields};

/// Delivery channel for password reset codes.
pub trait PasswordResetSink: Send + Sync {
    fn deliver(&self, email: &str, code: &str);
}

/// Writes reset codes to the debug log. Development only.
pub struct LogResetSink;

impl PasswordResetSink for LogResetSink {
    fn deliver(&self, email: &str, code: &str) {
        debug!(email = %email, code = %code, "password reset code issued");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: Uuid,
    email: String,
    password_hash: String,
    #[serde(default)]
    epoch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_code_hash: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_expires_at: Option<i64>,
}

impl Account {
    fn identity(&self) -> AuthIdentity {
        AuthIdentity {
            uid: self.uid,
            email: self.email.clone(),
        }
    }
}

pub struct LocalAuth {
    store: Arc<dyn DocumentStore>,
    keys: JwtKeys,
    reset_ttl: TimeDuration,
    resets: Arc<dyn PasswordResetSink>,
}

impl LocalAuth {
    pub fn new(store: Arc<dyn DocumentStore>, jwt: &JwtConfig, reset_ttl_minutes: i64) -> Self {
        Self {
            store,
            keys: JwtKeys::from(jwt),
            reset_ttl: TimeDuration::minutes(reset_ttl_minutes.max(1)),
            resets: Arc::new(LogResetSink),
        }
    }

    pub fn with_reset_sink(mut self, resets: Arc<dyn PasswordResetSink>) -> Self {
        self.resets = resets;
        self
    }

    fn account_doc(email: &str) -> DocRef {
        DocRef::new("accounts", email)
    }

    async fn load(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let Some(doc) = self.store.get(&Self::account_doc(email)).await? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(doc.data))
            .map(Some)
            .map_err(|e| AuthError::Backend(format!("corrupt account record: {e}")))
    }

    async fn require(&self, email: &str) -> Result<Account, AuthError> {
        self.load(email).await?.ok_or(AuthError::UserNotFound)
    }

    async fn patch(&self, email: &str, patch: serde_json::Map<String, Value>) -> Result<(), AuthError> {
        self.store.update(&Self::account_doc(email), patch).await?;
        Ok(())
    }

    fn session(&self, account: &Account) -> Result<AuthSession, AuthError> {
        let sign = |kind| {
            self.keys
                .sign(account.uid, &account.email, account.epoch, kind)
                .map_err(|e| AuthError::Backend(e.to_string()))
        };
        Ok(AuthSession {
            user: account.identity(),
            access_token: sign(TokenKind::Access)?,
            refresh_token: sign(TokenKind::Refresh)?,
        })
    }

    /// Resolve verified claims against the stored account.
    async fn current(&self, claims: &Claims) -> Result<Account, AuthError> {
        let account = self
            .load(&claims.email)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if account.uid != claims.sub || account.epoch != claims.epoch {
            warn!(user_id = %claims.sub, "token from an ended session");
            return Err(AuthError::InvalidToken);
        }
        Ok(account)
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        check_strength(password)?;

        let account = Account {
            uid: Uuid::new_v4(),
            email: email.clone(),
            password_hash: hash_secret(password)?,
            epoch: 0,
            reset_code_hash: None,
            reset_expires_at: None,
        };

        // the whole record claims the email; a second sign-up sees it exists
        let data = to_fields(&account).map_err(|e| AuthError::Backend(e.to_string()))?;
        match self.store.create(&Self::account_doc(&email), data).await {
            Err(StoreError::Conflict { .. }) => return Err(AuthError::EmailInUse),
            other => other?,
        };

        info!(user_id = %account.uid, email = %email, "account created");
        self.session(&account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let account = self.require(&email).await?;
        if !verify_secret(password, &account.password_hash)? {
            warn!(user_id = %account.uid, "sign in with wrong password");
            return Err(AuthError::WrongPassword);
        }
        info!(user_id = %account.uid, "signed in");
        self.session(&account)
    }

    async fn sign_out(&self, user: &AuthIdentity) -> Result<(), AuthError> {
        let account = self.require(&user.email).await?;
        self.patch(&user.email, fields([("epoch", json!(account.epoch + 1))]))
            .await?;
        info!(user_id = %user.uid, "signed out");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let account = self.require(&email).await?;
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let expires = OffsetDateTime::now_utc() + self.reset_ttl;
        self.patch(
            &email,
            fields([
                ("resetCodeHash", json!(hash_secret(&code)?)),
                ("resetExpiresAt", json!(expires.unix_timestamp())),
            ]),
        )
        .await?;
        self.resets.deliver(&email, &code);
        info!(user_id = %account.uid, "password reset requested");
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let account = self.require(&email).await?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let valid = match (&account.reset_code_hash, account.reset_expires_at) {
            (Some(hash), Some(expires)) if expires > now => verify_secret(code.trim(), hash)?,
            _ => false,
        };
        if !valid {
            return Err(AuthError::ResetCodeInvalid);
        }
        check_strength(new_password)?;
        self.patch(
            &email,
            fields([
                ("passwordHash", json!(hash_secret(new_password)?)),
                ("resetCodeHash", Value::Null),
                ("resetExpiresAt", Value::Null),
                ("epoch", json!(account.epoch + 1)),
            ]),
        )
        .await?;
        info!(user_id = %account.uid, "password reset");
        Ok(())
    }

    async fn reauthenticate(&self, user: &AuthIdentity, password: &str) -> Result<(), AuthError> {
        let account = self.require(&user.email).await?;
        if account.uid != user.uid {
            return Err(AuthError::InvalidCredential);
        }
        if !verify_secret(password, &account.password_hash)? {
            return Err(AuthError::WrongPassword);
        }
        Ok(())
    }

    async fn change_password(
        &self,
        user: &AuthIdentity,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        check_strength(new_password)?;
        let mut account = self.require(&user.email).await?;
        account.password_hash = hash_secret(new_password)?;
        account.epoch += 1;
        self.patch(
            &user.email,
            fields([
                ("passwordHash", json!(account.password_hash)),
                ("epoch", json!(account.epoch)),
            ]),
        )
        .await?;
        info!(user_id = %user.uid, "password changed");
        self.session(&account)
    }

    async fn delete_user(&self, user: &AuthIdentity) -> Result<(), AuthError> {
        self.store.delete(&Self::account_doc(&user.email)).await?;
        info!(user_id = %user.uid, "account deleted");
        Ok(())
    }

    async fn verify_token(&self, access_token: &str) -> Result<AuthIdentity, AuthError> {
        let claims = self
            .keys
            .verify(access_token, TokenKind::Access)
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(self.current(&claims).await?.identity())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let claims = self
            .keys
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidToken)?;
        let account = self.current(&claims).await?;
        self.session(&account)
    }
}

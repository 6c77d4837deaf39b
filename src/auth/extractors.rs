use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{AuthError, AuthIdentity};
use crate::{error::AppError, state::AppState};

/// Validates the `Bearer` access token and yields the signed-in account.
pub struct AuthUser(pub AuthIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|auth| {
                auth.strip_prefix("Bearer ")
                    .or_else(|| auth.strip_prefix("bearer "))
            })
            .ok_or(AuthError::InvalidToken)?;

        let identity = state.auth.verify_token(token).await.map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            e
        })?;
        Ok(AuthUser(identity))
    }
}
